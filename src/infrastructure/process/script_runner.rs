//! Bash Script Runner - 汇总 / 清理等外部脚本

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use crate::application::ports::{ProcessError, ScriptRunnerPort};

/// 以 `bash <script>` 方式运行，工作目录为 `workdir`
pub struct BashScriptRunner {
    workdir: PathBuf,
    envs: Vec<(String, OsString)>,
}

impl BashScriptRunner {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            envs: Vec::new(),
        }
    }

    /// 传给每个脚本的环境变量（如 `ARTIFACTS_DIR`）
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<OsString>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }
}

#[async_trait]
impl ScriptRunnerPort for BashScriptRunner {
    async fn run(&self, script: &Path) -> Result<(), ProcessError> {
        let resolved = self.workdir.join(script);
        if !resolved.is_file() {
            return Err(ProcessError::IoError(format!(
                "script not found: {}",
                resolved.display()
            )));
        }

        let status = Command::new("bash")
            .arg(script)
            .current_dir(&self.workdir)
            .envs(self.envs.iter().map(|(k, v)| (k, v)))
            .status()
            .await
            .map_err(|e| ProcessError::Spawn {
                program: "bash".to_string(),
                message: e.to_string(),
            })?;

        if !status.success() {
            return Err(ProcessError::CommandFailed {
                command: format!("bash {}", script.display()),
                status: status.to_string(),
            });
        }
        tracing::debug!(script = %script.display(), "Script finished");
        Ok(())
    }
}
