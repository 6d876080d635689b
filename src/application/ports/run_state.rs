//! Run State Port - 跨步骤 / 跨运行的本地状态
//!
//! 每个文件只有一个写入步骤，不需要加锁。

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("IO error on {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Run State Port
#[async_trait]
pub trait RunStatePort: Send + Sync {
    /// 上次成功的工作流
    async fn load_last_success(&self) -> Result<Option<PathBuf>, StateError>;

    async fn save_last_success(&self, prompt: &Path) -> Result<(), StateError>;

    /// 提交标记是否存在
    async fn marker_exists(&self) -> bool;

    /// 创建零字节提交标记
    async fn create_marker(&self) -> Result<(), StateError>;

    async fn save_gpu_info(&self, info: &Value) -> Result<(), StateError>;

    async fn load_gpu_info(&self) -> Result<Option<Value>, StateError>;

    /// 运行计时
    async fn save_timings(&self, timings: &Value) -> Result<(), StateError>;
}
