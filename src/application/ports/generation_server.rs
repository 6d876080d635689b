//! Generation Server Port - 图像生成服务抽象
//!
//! 只依赖 ComfyUI HTTP API 的最小约定:
//! - `GET /`
//! - `POST /prompt`
//! - `GET /history/{id}`
//! - `GET /view?filename=&subfolder=&type=`

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::domain::{ImageDescriptor, JobId};

/// 生成服务错误（传输层）
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// HTTP 响应（状态码 + 内容）
#[derive(Debug, Clone)]
pub struct ServerReply<T> {
    pub status: u16,
    pub body: T,
}

impl<T> ServerReply<T> {
    pub fn new(status: u16, body: T) -> Self {
        Self { status, body }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Generation Server Port
#[async_trait]
pub trait GenerationServerPort: Send + Sync {
    /// 服务 Base URL（用于日志）
    fn base_url(&self) -> &str;

    /// `GET /`，返回状态码
    async fn ping(&self) -> Result<u16, ServerError>;

    /// `POST /prompt`，请求体已包含 `{"prompt": ...}`
    ///
    /// 响应体不是 JSON 时为 `None`。
    async fn submit_prompt(&self, body: &Value) -> Result<ServerReply<Option<Value>>, ServerError>;

    /// `GET /history/{id}`
    async fn history(&self, job_id: &JobId) -> Result<ServerReply<Option<Value>>, ServerError>;

    /// `GET /view`，返回原始字节
    async fn view(&self, image: &ImageDescriptor) -> Result<ServerReply<Vec<u8>>, ServerError>;
}
