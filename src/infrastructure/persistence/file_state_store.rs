//! File Run State Store - 产物目录下的 JSON 状态文件
//!
//! - `last_success.json`: `{"prompt": "<path>", "recorded_at": "..."}`
//! - `gpu_info.json`: 主机 / GPU 描述
//! - `run_timings.json`: 运行计时
//! - `.submitted`: 零字节提交标记

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::application::ports::{RunStatePort, StateError};

const LAST_SUCCESS_FILE: &str = "last_success.json";
const GPU_INFO_FILE: &str = "gpu_info.json";
const TIMINGS_FILE: &str = "run_timings.json";
const MARKER_FILE: &str = ".submitted";

#[derive(Debug, Serialize, Deserialize)]
struct LastSuccessRecord {
    prompt: PathBuf,
    recorded_at: String,
}

/// 基于文件的运行状态
pub struct FileRunStateStore {
    dir: PathBuf,
}

impl FileRunStateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    async fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<(), StateError> {
        let path = self.path(name);
        let bytes = serde_json::to_vec_pretty(value).map_err(|e| StateError::Parse {
            path: path.clone(),
            message: e.to_string(),
        })?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| io_error(&self.dir, e))?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| io_error(&path, e))
    }

    /// 文件不存在时返回 None
    async fn read_json<T: for<'de> Deserialize<'de>>(&self, name: &str) -> Result<Option<T>, StateError> {
        let path = self.path(name);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(&path, e)),
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StateError::Parse {
                path,
                message: e.to_string(),
            })
    }
}

fn io_error(path: &Path, e: std::io::Error) -> StateError {
    StateError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

#[async_trait]
impl RunStatePort for FileRunStateStore {
    async fn load_last_success(&self) -> Result<Option<PathBuf>, StateError> {
        Ok(self
            .read_json::<LastSuccessRecord>(LAST_SUCCESS_FILE)
            .await?
            .map(|r| r.prompt))
    }

    async fn save_last_success(&self, prompt: &Path) -> Result<(), StateError> {
        let record = LastSuccessRecord {
            prompt: prompt.to_path_buf(),
            recorded_at: Utc::now().to_rfc3339(),
        };
        self.write_json(LAST_SUCCESS_FILE, &record).await
    }

    async fn marker_exists(&self) -> bool {
        tokio::fs::try_exists(self.path(MARKER_FILE))
            .await
            .unwrap_or(false)
    }

    async fn create_marker(&self) -> Result<(), StateError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| io_error(&self.dir, e))?;
        let path = self.path(MARKER_FILE);
        tokio::fs::write(&path, b"")
            .await
            .map_err(|e| io_error(&path, e))
    }

    async fn save_gpu_info(&self, info: &Value) -> Result<(), StateError> {
        self.write_json(GPU_INFO_FILE, info).await
    }

    async fn load_gpu_info(&self) -> Result<Option<Value>, StateError> {
        self.read_json(GPU_INFO_FILE).await
    }

    async fn save_timings(&self, timings: &Value) -> Result<(), StateError> {
        self.write_json(TIMINGS_FILE, timings).await
    }
}
