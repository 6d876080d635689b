//! HTTP Result Sink - 向远程表格端点 POST 汇总行
//!
//! 端点写入后通常以 302 跳转到结果页，客户端默认跟随跳转，
//! 最终状态码交给调用方判断。

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value};
use std::time::Duration;

use crate::application::ports::{ResultSinkPort, SinkError};

#[derive(Debug, Clone)]
pub struct HttpResultSinkConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
}

pub struct HttpResultSink {
    client: Client,
    config: HttpResultSinkConfig,
}

impl HttpResultSink {
    pub fn new(config: HttpResultSinkConfig) -> Result<Self, SinkError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SinkError::NetworkError(e.to_string()))?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl ResultSinkPort for HttpResultSink {
    async fn post(&self, row: &Map<String, Value>) -> Result<u16, SinkError> {
        let response = self
            .client
            .post(&self.config.endpoint)
            .json(row)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SinkError::Timeout
                } else {
                    SinkError::NetworkError(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        tracing::debug!(endpoint = %self.config.endpoint, status, "Result endpoint replied");
        Ok(status)
    }
}
