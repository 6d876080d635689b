//! Command Handlers 实现
//!
//! 所有 CommandHandler 的具体实现

mod fetch_models_handler;
mod run_benchmark_handler;
mod run_job_handler;
mod submit_result_handler;

pub use fetch_models_handler::*;
pub use run_benchmark_handler::*;
pub use run_job_handler::*;
pub use submit_result_handler::*;
