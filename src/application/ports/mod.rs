//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod downloader;
mod environment;
mod generation_server;
mod host_probe;
mod result_sink;
mod run_state;
mod server_process;

pub use downloader::{DownloadError, DownloaderPort};
pub use environment::{ProvisionOutcome, ProvisionerPort, ScriptRunnerPort};
pub use generation_server::{GenerationServerPort, ServerError, ServerReply};
pub use host_probe::{GpuInfo, HostInfo, HostProbePort};
pub use result_sink::{ResultSinkPort, SinkError};
pub use run_state::{RunStatePort, StateError};
pub use server_process::{ProcessError, ServerHandle, ServerLauncherPort, StopOutcome};
