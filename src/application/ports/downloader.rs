//! Downloader Port - 远程资源下载抽象

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// 下载错误
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("IO error: {0}")]
    IoError(String),
}

/// Downloader Port
#[async_trait]
pub trait DownloaderPort: Send + Sync {
    /// 获取文本资源（清单）
    async fn fetch_text(&self, url: &str) -> Result<String, DownloadError>;

    /// 下载到指定文件，返回写入的字节数
    ///
    /// 目标目录须已存在；失败时不留下不完整的目标文件。
    async fn download_to(&self, url: &str, dest: &Path) -> Result<u64, DownloadError>;
}
