//! Result Sink Port - 远程表格接收端抽象

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout")]
    Timeout,
}

/// Result Sink Port
///
/// 只负责发送；是否成功由调用方按状态码判断。
#[async_trait]
pub trait ResultSinkPort: Send + Sync {
    /// POST 单层键值 JSON，返回 HTTP 状态码
    async fn post(&self, row: &Map<String, Value>) -> Result<u16, SinkError>;
}
