//! Server Process Port - 生成服务子进程生命周期抽象

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// 进程相关错误
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Entry point not found: {0}")]
    MissingEntryPoint(PathBuf),

    #[error("Failed to spawn {program}: {message}")]
    Spawn { program: String, message: String },

    #[error("{command} exited with {status}")]
    CommandFailed { command: String, status: String },

    #[error("Unsupported interpreter version {found} (need >= {min}, < {max})")]
    IncompatibleInterpreter {
        found: String,
        min: String,
        max: String,
    },

    #[error("Source tree unavailable: {0}")]
    SourceUnavailable(String),

    #[error("IO error: {0}")]
    IoError(String),
}

/// 停止方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// 收到 SIGTERM 后在宽限期内退出
    Graceful,
    /// 宽限期后强制结束
    Killed,
    /// 停止前进程已退出
    AlreadyExited,
}

/// 运行中的服务进程
#[async_trait]
pub trait ServerHandle: Send {
    fn pid(&self) -> Option<u32>;

    /// 先优雅终止，超过 `grace` 后强制结束
    async fn stop(self: Box<Self>, grace: Duration) -> Result<StopOutcome, ProcessError>;
}

/// Server Launcher Port
#[async_trait]
pub trait ServerLauncherPort: Send + Sync {
    /// 在回环地址和指定端口上启动服务
    async fn start(&self, port: u16) -> Result<Box<dyn ServerHandle>, ProcessError>;
}
