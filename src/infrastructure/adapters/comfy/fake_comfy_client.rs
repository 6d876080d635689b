//! Fake ComfyUI Client - 用于测试的生成服务
//!
//! 不发起网络请求，按配置模拟就绪延迟、提交失败和轮询次数

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::application::ports::{GenerationServerPort, ServerError, ServerReply};
use crate::domain::{ImageDescriptor, JobId};

/// Fake ComfyUI Client 配置
#[derive(Debug, Clone)]
pub struct FakeComfyClientConfig {
    /// 前 N 次 ping 返回连接错误
    pub pings_until_ready: usize,
    /// 前 N 次提交返回 500
    pub fail_submissions: usize,
    /// 第 N 次 history 请求才出现 outputs
    pub polls_until_complete: usize,
    /// 完成后返回的 outputs
    pub outputs: Value,
    /// `/view` 返回 404 的文件名
    pub missing_views: Vec<String>,
}

impl Default for FakeComfyClientConfig {
    fn default() -> Self {
        Self {
            pings_until_ready: 0,
            fail_submissions: 0,
            polls_until_complete: 1,
            outputs: json!({
                "9": {"images": [
                    {"filename": "ComfyUI_00001_.png", "subfolder": "", "type": "output"}
                ]}
            }),
            missing_views: Vec::new(),
        }
    }
}

/// Fake ComfyUI Client
pub struct FakeComfyClient {
    config: FakeComfyClientConfig,
    pings: AtomicUsize,
    submissions: Mutex<Vec<Value>>,
    histories: AtomicUsize,
    /// 当前任务已轮询次数
    pending_polls: AtomicUsize,
}

impl FakeComfyClient {
    pub fn new(config: FakeComfyClientConfig) -> Self {
        Self {
            config,
            pings: AtomicUsize::new(0),
            submissions: Mutex::new(Vec::new()),
            histories: AtomicUsize::new(0),
            pending_polls: AtomicUsize::new(0),
        }
    }

    pub fn ping_count(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    /// 收到的全部请求体（包括被拒绝的）
    pub fn submitted(&self) -> Vec<Value> {
        self.submissions
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    pub fn history_count(&self) -> usize {
        self.histories.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationServerPort for FakeComfyClient {
    fn base_url(&self) -> &str {
        "fake://comfyui"
    }

    async fn ping(&self) -> Result<u16, ServerError> {
        let n = self.pings.fetch_add(1, Ordering::SeqCst) + 1;
        if n > self.config.pings_until_ready {
            Ok(200)
        } else {
            Err(ServerError::NetworkError("connection refused".to_string()))
        }
    }

    async fn submit_prompt(&self, body: &Value) -> Result<ServerReply<Option<Value>>, ServerError> {
        let n = {
            let mut submissions = self
                .submissions
                .lock()
                .map_err(|e| ServerError::NetworkError(e.to_string()))?;
            submissions.push(body.clone());
            submissions.len()
        };

        if n <= self.config.fail_submissions {
            return Ok(ServerReply::new(
                500,
                Some(json!({"error": "prompt validation failed"})),
            ));
        }
        Ok(ServerReply::new(
            200,
            Some(json!({"prompt_id": format!("fake-{}", n), "number": n})),
        ))
    }

    async fn history(&self, job_id: &JobId) -> Result<ServerReply<Option<Value>>, ServerError> {
        self.histories.fetch_add(1, Ordering::SeqCst);
        let n = self.pending_polls.fetch_add(1, Ordering::SeqCst) + 1;
        if n < self.config.polls_until_complete {
            return Ok(ServerReply::new(200, Some(json!({}))));
        }
        self.pending_polls.store(0, Ordering::SeqCst);
        Ok(ServerReply::new(
            200,
            Some(json!({ (job_id.as_str()): {"outputs": self.config.outputs.clone()} })),
        ))
    }

    async fn view(&self, image: &ImageDescriptor) -> Result<ServerReply<Vec<u8>>, ServerError> {
        let name = image.filename.clone().unwrap_or_default();
        if self.config.missing_views.contains(&name) {
            return Ok(ServerReply::new(404, Vec::new()));
        }
        Ok(ServerReply::new(200, format!("fake image {}", name).into_bytes()))
    }
}
