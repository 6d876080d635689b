//! ComfyUI Server Process
//!
//! `<python> main.py --listen <host> --port <port>`，工作目录为安装目录，
//! stdout / stderr 写入日志目录。停止时先 SIGTERM，宽限期后 SIGKILL。

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};

use crate::application::ports::{ProcessError, ServerHandle, ServerLauncherPort, StopOutcome};

const ENTRY_POINT: &str = "main.py";

#[derive(Debug, Clone)]
pub struct ComfyServerConfig {
    /// 安装目录
    pub dir: PathBuf,
    pub host: String,
    pub python: String,
    /// 进程输出日志目录
    pub logs_dir: PathBuf,
}

pub struct ComfyServerLauncher {
    config: ComfyServerConfig,
}

impl ComfyServerLauncher {
    pub fn new(config: ComfyServerConfig) -> Self {
        Self { config }
    }

    async fn log_file(&self, name: &str) -> Result<Stdio, ProcessError> {
        let path = self.config.logs_dir.join(name);
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| ProcessError::IoError(format!("{}: {}", path.display(), e)))?;
        Ok(Stdio::from(file.into_std().await))
    }
}

#[async_trait]
impl ServerLauncherPort for ComfyServerLauncher {
    async fn start(&self, port: u16) -> Result<Box<dyn ServerHandle>, ProcessError> {
        let entry = self.config.dir.join(ENTRY_POINT);
        if !entry.is_file() {
            return Err(ProcessError::MissingEntryPoint(entry));
        }

        tokio::fs::create_dir_all(&self.config.logs_dir)
            .await
            .map_err(|e| ProcessError::IoError(format!("{}: {}", self.config.logs_dir.display(), e)))?;

        let port = port.to_string();
        let args = [ENTRY_POINT, "--listen", self.config.host.as_str(), "--port", port.as_str()];
        tracing::debug!("Spawning: {} {}", self.config.python, args.join(" "));

        let stdout = self.log_file("server.stdout.log").await?;
        let stderr = self.log_file("server.stderr.log").await?;

        let child = Command::new(&self.config.python)
            .args(args)
            .current_dir(&self.config.dir)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ProcessError::Spawn {
                program: self.config.python.clone(),
                message: e.to_string(),
            })?;

        Ok(Box::new(ComfyServerProcess { child }))
    }
}

/// 运行中的 ComfyUI 进程，drop 时强制结束
struct ComfyServerProcess {
    child: Child,
}

#[async_trait]
impl ServerHandle for ComfyServerProcess {
    fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    async fn stop(self: Box<Self>, grace: Duration) -> Result<StopOutcome, ProcessError> {
        let mut child = self.child;
        if let Ok(Some(status)) = child.try_wait() {
            tracing::debug!(status = %status, "Server process exited before stop");
            return Ok(StopOutcome::AlreadyExited);
        }

        if let Some(pid) = child.id() {
            unsafe { libc::kill(pid as i32, libc::SIGTERM) };
        }

        match tokio::time::timeout(grace, child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(status = %status, "Server process exited");
                Ok(StopOutcome::Graceful)
            }
            Ok(Err(e)) => Err(ProcessError::IoError(e.to_string())),
            Err(_) => {
                child
                    .kill()
                    .await
                    .map_err(|e| ProcessError::IoError(e.to_string()))?;
                Ok(StopOutcome::Killed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    /// 用 sh 代替 python，main.py 是一段 shell 脚本
    fn launcher(script: Option<&str>) -> (TempDir, ComfyServerLauncher) {
        let temp = tempdir().unwrap();
        if let Some(script) = script {
            std::fs::write(temp.path().join("main.py"), script).unwrap();
        }
        let launcher = ComfyServerLauncher::new(ComfyServerConfig {
            dir: temp.path().to_path_buf(),
            host: "127.0.0.1".to_string(),
            python: "sh".to_string(),
            logs_dir: temp.path().join("logs"),
        });
        (temp, launcher)
    }

    #[tokio::test]
    async fn test_missing_entry_point_is_fatal() {
        let (_temp, launcher) = launcher(None);

        let result = launcher.start(8188).await;
        assert!(matches!(result, Err(ProcessError::MissingEntryPoint(_))));
    }

    #[tokio::test]
    async fn test_sigterm_stops_server_gracefully() {
        let (temp, launcher) = launcher(Some("echo \"listening on $4\"\nexec sleep 30\n"));

        let handle = launcher.start(8188).await.unwrap();
        assert!(handle.pid().is_some());
        tokio::time::sleep(Duration::from_millis(100)).await;

        let outcome = handle.stop(Duration::from_secs(5)).await.unwrap();
        assert_eq!(outcome, StopOutcome::Graceful);

        let stdout = std::fs::read_to_string(temp.path().join("logs/server.stdout.log")).unwrap();
        assert!(stdout.contains("listening on 8188"));
    }

    #[tokio::test]
    async fn test_ignored_sigterm_escalates_to_kill() {
        let (_temp, launcher) = launcher(Some("trap '' TERM\nexec sleep 30\n"));

        let handle = launcher.start(8188).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let outcome = handle.stop(Duration::from_millis(200)).await.unwrap();
        assert_eq!(outcome, StopOutcome::Killed);
    }

    #[tokio::test]
    async fn test_exited_server_is_reported() {
        let (_temp, launcher) = launcher(Some("exit 3\n"));

        let handle = launcher.start(8188).await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        let outcome = handle.stop(Duration::from_secs(1)).await.unwrap();
        assert_eq!(outcome, StopOutcome::AlreadyExited);
    }
}
