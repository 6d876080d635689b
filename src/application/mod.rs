//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（GenerationServer、ServerLauncher、Downloader、ResultSink 等）
//! - commands: 命令及处理器
//! - readiness: 就绪探测
//! - lifecycle: 服务进程作用域
//! - error: 应用层错误定义

pub mod commands;
pub mod error;
pub mod lifecycle;
pub mod ports;
pub mod readiness;

// Re-exports
pub use commands::{
    FetchModels, RunBenchmark, RunJob, SubmitResult,
    // Handlers
    handlers::{
        BenchmarkServices, FetchModelsHandler, FetchReport, JobDriverConfig, RunBenchmarkConfig,
        RunBenchmarkHandler, RunJobHandler, RunReport, SubmitResultHandler,
    },
};

pub use error::ApplicationError;
pub use lifecycle::ServerScope;
pub use readiness::ReadinessProber;

pub use ports::{
    // Generation server
    GenerationServerPort,
    ServerError,
    ServerReply,
    // Process lifecycle
    ProcessError,
    ServerHandle,
    ServerLauncherPort,
    StopOutcome,
    // Environment
    ProvisionOutcome,
    ProvisionerPort,
    ScriptRunnerPort,
    // Downloads
    DownloadError,
    DownloaderPort,
    // Reporting
    ResultSinkPort,
    SinkError,
    // Host / state
    GpuInfo,
    HostInfo,
    HostProbePort,
    RunStatePort,
    StateError,
};
