//! Commands - 命令及处理器

mod benchmark_commands;
pub mod handlers;

pub use benchmark_commands::{FetchModels, RunBenchmark, RunJob, SubmitResult};
