//! Domain Layer - 领域层
//!
//! - prompt: 工作流文件与编号回退
//! - job: 生成任务状态与输出
//! - manifest: 模型清单解析
//! - summary: 上报汇总的补充与压平

pub mod job;
pub mod manifest;
pub mod prompt;
pub mod summary;

pub use job::{ImageDescriptor, JobId, JobResult, JobState};
pub use manifest::{DownloadDirective, ManifestLine};
pub use prompt::{PromptCatalog, PromptError, PromptResolution, PromptSpec};
pub use summary::{flatten, SubmissionEnvelope};
