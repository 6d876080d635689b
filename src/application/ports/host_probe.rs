//! Host Probe Port - 主机与 GPU 描述信息

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// 单块 GPU
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuInfo {
    pub name: String,
    pub memory_total_mib: Option<u64>,
    pub driver_version: Option<String>,
}

/// 主机描述
///
/// 采集失败不会中断运行，原因写入 `error`。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostInfo {
    pub hostname: Option<String>,
    pub os: Option<String>,
    pub cpu: Option<String>,
    pub cpu_cores: usize,
    pub memory_total_bytes: u64,
    #[serde(default)]
    pub gpus: Vec<GpuInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Host Probe Port
#[async_trait]
pub trait HostProbePort: Send + Sync {
    /// 尽力采集，永不失败
    async fn collect(&self) -> HostInfo;
}
