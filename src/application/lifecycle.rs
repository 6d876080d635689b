//! Server Scope - 服务进程的作用域管理
//!
//! 启动后得到一个 `ServerScope`，`run` 执行完工作后无论结果如何都会停止服务，
//! 工作中 panic 也先停止服务再继续展开。停止只发生一次（`stop` 消费句柄）。

use futures_util::FutureExt;
use std::future::Future;
use std::panic::{resume_unwind, AssertUnwindSafe};
use std::time::Duration;

use crate::application::ports::{ProcessError, ServerHandle, ServerLauncherPort, StopOutcome};

pub struct ServerScope {
    handle: Box<dyn ServerHandle>,
    grace: Duration,
}

impl ServerScope {
    /// 启动服务
    pub async fn start(
        launcher: &dyn ServerLauncherPort,
        port: u16,
        grace: Duration,
    ) -> Result<Self, ProcessError> {
        let handle = launcher.start(port).await?;
        tracing::info!(pid = ?handle.pid(), port, "Server process started");
        Ok(Self { handle, grace })
    }

    pub fn pid(&self) -> Option<u32> {
        self.handle.pid()
    }

    /// 执行 `work`，完成后停止服务
    pub async fn run<T, F>(self, work: F) -> T
    where
        F: Future<Output = T>,
    {
        let output = AssertUnwindSafe(work).catch_unwind().await;
        if output.is_err() {
            tracing::error!(pid = ?self.pid(), "Work panicked inside server scope");
        }
        self.shutdown().await;

        match output {
            Ok(output) => output,
            Err(panic) => resume_unwind(panic),
        }
    }

    /// 停止服务，错误只记录不返回
    pub async fn shutdown(self) {
        let pid = self.handle.pid();
        tracing::info!(pid = ?pid, "Shutting down server");

        match self.handle.stop(self.grace).await {
            Ok(StopOutcome::Graceful) => tracing::info!(pid = ?pid, "Server stopped"),
            Ok(StopOutcome::Killed) => {
                tracing::warn!(pid = ?pid, "Server ignored SIGTERM, killed")
            }
            Ok(StopOutcome::AlreadyExited) => {
                tracing::warn!(pid = ?pid, "Server had already exited")
            }
            Err(e) => tracing::error!(pid = ?pid, error = %e, "Failed to stop server"),
        }
    }
}
