//! 应用层错误定义
//!
//! 只有致命前置条件会以错误形式离开编排器；
//! 单项失败在发生处记录并跳过。

use thiserror::Error;

use super::ports::{DownloadError, ProcessError, StateError};

/// 应用层错误
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// 源码树无法获取
    #[error("Provisioning failed: {0}")]
    Provisioning(String),

    /// 解释器版本不在兼容范围
    #[error("Unsupported environment: {0}")]
    UnsupportedEnvironment(String),

    /// 服务进程无法启动
    #[error("Server launch failed: {0}")]
    Launch(String),

    /// 服务未在限定时间内就绪
    #[error("Server at {url} not ready within {timeout_secs}s")]
    NotReady { url: String, timeout_secs: u64 },

    /// 模型清单无法获取
    #[error("Model manifest unavailable: {0}")]
    ManifestUnavailable(String),

    /// 本地状态读写失败
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// 内部错误
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApplicationError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl From<ProcessError> for ApplicationError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::IncompatibleInterpreter { .. } => {
                Self::UnsupportedEnvironment(err.to_string())
            }
            ProcessError::SourceUnavailable(_) => Self::Provisioning(err.to_string()),
            other => Self::Launch(other.to_string()),
        }
    }
}

impl From<DownloadError> for ApplicationError {
    fn from(err: DownloadError) -> Self {
        Self::ManifestUnavailable(err.to_string())
    }
}
