//! System Host Probe - sysinfo + nvidia-smi
//!
//! 两部分都是尽力而为：任何一步失败只把原因写入 `HostInfo::error`。

use async_trait::async_trait;
use sysinfo::{CpuRefreshKind, MemoryRefreshKind, RefreshKind, System};
use tokio::process::Command;

use crate::application::ports::{GpuInfo, HostInfo, HostProbePort};

const NVIDIA_SMI_ARGS: [&str; 2] = [
    "--query-gpu=name,memory.total,driver_version",
    "--format=csv,noheader,nounits",
];

/// 解析 `nvidia-smi --query-gpu=name,memory.total,driver_version --format=csv,noheader,nounits`
pub fn parse_nvidia_smi(output: &str) -> Vec<GpuInfo> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter_map(|line| {
            let mut fields = line.split(',').map(str::trim);
            let name = fields.next().filter(|n| !n.is_empty())?.to_string();
            let memory_total_mib = fields.next().and_then(|m| m.parse().ok());
            let driver_version = fields
                .next()
                .filter(|d| !d.is_empty())
                .map(str::to_string);
            Some(GpuInfo {
                name,
                memory_total_mib,
                driver_version,
            })
        })
        .collect()
}

#[derive(Debug, Default)]
pub struct SystemHostProbe;

impl SystemHostProbe {
    pub fn new() -> Self {
        Self
    }

    fn host_section(info: &mut HostInfo) {
        let sys = System::new_with_specifics(
            RefreshKind::nothing()
                .with_cpu(CpuRefreshKind::nothing())
                .with_memory(MemoryRefreshKind::nothing().with_ram()),
        );

        info.hostname = System::host_name();
        info.os = System::long_os_version().or_else(System::name);
        info.cpu = sys
            .cpus()
            .first()
            .map(|c| c.brand().trim().to_string())
            .filter(|b| !b.is_empty());
        info.cpu_cores = sys.cpus().len();
        info.memory_total_bytes = sys.total_memory();
    }

    async fn gpu_section() -> Result<Vec<GpuInfo>, String> {
        let output = Command::new("nvidia-smi")
            .args(NVIDIA_SMI_ARGS)
            .output()
            .await
            .map_err(|e| format!("nvidia-smi: {}", e))?;

        if !output.status.success() {
            return Err(format!(
                "nvidia-smi exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(parse_nvidia_smi(&String::from_utf8_lossy(&output.stdout)))
    }
}

#[async_trait]
impl HostProbePort for SystemHostProbe {
    async fn collect(&self) -> HostInfo {
        let mut info = HostInfo::default();
        Self::host_section(&mut info);

        match Self::gpu_section().await {
            Ok(gpus) => info.gpus = gpus,
            Err(e) => info.error = Some(e),
        }
        info
    }
}
