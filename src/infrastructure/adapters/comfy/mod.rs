//! ComfyUI Adapter - 生成服务 HTTP 客户端实现

mod fake_comfy_client;
mod http_comfy_client;

pub use fake_comfy_client::{FakeComfyClient, FakeComfyClientConfig};
pub use http_comfy_client::*;
