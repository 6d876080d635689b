//! HTTP ComfyUI Client - 调用本地 ComfyUI HTTP 服务
//!
//! 实现 GenerationServerPort trait
//!
//! ComfyUI API:
//! GET  http://127.0.0.1:8188/
//! POST http://127.0.0.1:8188/prompt            Request: {"prompt": {...}}  Response: {"prompt_id": "..."}
//! GET  http://127.0.0.1:8188/history/{id}      Response: {"<id>": {"outputs": {...}}}
//! GET  http://127.0.0.1:8188/view?filename=&subfolder=&type=

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::Value;
use std::time::Duration;

use crate::application::ports::{GenerationServerPort, ServerError, ServerReply};
use crate::domain::{ImageDescriptor, JobId};

/// HTTP ComfyUI 客户端配置
#[derive(Debug, Clone)]
pub struct HttpComfyClientConfig {
    /// 服务基础 URL
    pub base_url: String,
    /// 单次请求超时时间（秒）
    pub timeout_secs: u64,
}

impl Default for HttpComfyClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8188".to_string(),
            timeout_secs: 30,
        }
    }
}

impl HttpComfyClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// HTTP ComfyUI 客户端
pub struct HttpComfyClient {
    client: Client,
    config: HttpComfyClientConfig,
}

impl HttpComfyClient {
    pub fn new(config: HttpComfyClientConfig) -> Result<Self, ServerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ServerError::NetworkError(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// 读取 JSON 响应体，非 JSON 时为 None
    async fn json_reply(response: Response) -> Result<ServerReply<Option<Value>>, ServerError> {
        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ServerError::InvalidResponse(format!("Failed to read body: {}", e)))?;
        let body = serde_json::from_slice::<Value>(&bytes).ok();
        Ok(ServerReply::new(status, body))
    }
}

fn map_send_error(e: reqwest::Error) -> ServerError {
    if e.is_timeout() {
        ServerError::Timeout
    } else if e.is_connect() {
        ServerError::NetworkError(format!("Cannot connect to ComfyUI: {}", e))
    } else {
        ServerError::NetworkError(e.to_string())
    }
}

#[async_trait]
impl GenerationServerPort for HttpComfyClient {
    fn base_url(&self) -> &str {
        &self.config.base_url
    }

    async fn ping(&self) -> Result<u16, ServerError> {
        let response = self
            .client
            .get(self.url("/"))
            .send()
            .await
            .map_err(map_send_error)?;
        Ok(response.status().as_u16())
    }

    async fn submit_prompt(&self, body: &Value) -> Result<ServerReply<Option<Value>>, ServerError> {
        tracing::debug!(url = %self.url("/prompt"), "Sending prompt");

        let response = self
            .client
            .post(self.url("/prompt"))
            .json(body)
            .send()
            .await
            .map_err(map_send_error)?;

        Self::json_reply(response).await
    }

    async fn history(&self, job_id: &JobId) -> Result<ServerReply<Option<Value>>, ServerError> {
        let response = self
            .client
            .get(self.url(&format!("/history/{}", job_id)))
            .send()
            .await
            .map_err(map_send_error)?;

        Self::json_reply(response).await
    }

    async fn view(&self, image: &ImageDescriptor) -> Result<ServerReply<Vec<u8>>, ServerError> {
        let filename = image.filename.clone().unwrap_or_default();
        let response = self
            .client
            .get(self.url("/view"))
            .query(&[
                ("filename", filename.as_str()),
                ("subfolder", image.subfolder.as_str()),
                ("type", image.image_type.as_str()),
            ])
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status().as_u16();
        let data = response
            .bytes()
            .await
            .map_err(|e| ServerError::InvalidResponse(format!("Failed to read image: {}", e)))?
            .to_vec();

        Ok(ServerReply::new(status, data))
    }
}
