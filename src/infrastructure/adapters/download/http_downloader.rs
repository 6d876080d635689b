//! HTTP Downloader - 模型清单与模型文件下载
//!
//! 文件先写入同目录的 `.part` 临时文件，完整写入后再重命名，
//! 失败时删除临时文件，目标路径不会出现半截文件。
//! 目标文件已存在且大小与服务端声明的一致时跳过下载。

use async_trait::async_trait;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

use crate::application::ports::{DownloadError, DownloaderPort};

/// HTTP 下载器配置
#[derive(Debug, Clone)]
pub struct HttpDownloaderConfig {
    /// 建立连接超时（秒）
    pub connect_timeout_secs: u64,
    /// 清单请求超时（秒），模型文件本身不设总超时
    pub manifest_timeout_secs: u64,
}

impl Default for HttpDownloaderConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            manifest_timeout_secs: 60,
        }
    }
}

pub struct HttpDownloader {
    client: Client,
    config: HttpDownloaderConfig,
}

impl HttpDownloader {
    pub fn new(config: HttpDownloaderConfig) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| DownloadError::NetworkError(e.to_string()))?;

        Ok(Self { client, config })
    }

    async fn get(&self, url: &str, timeout: Option<Duration>) -> Result<reqwest::Response, DownloadError> {
        let mut request = self.client.get(url);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DownloadError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }

    async fn stream_to(
        &self,
        mut response: reqwest::Response,
        part: &Path,
    ) -> Result<u64, DownloadError> {
        let mut file = tokio::fs::File::create(part)
            .await
            .map_err(|e| DownloadError::IoError(format!("{}: {}", part.display(), e)))?;

        let mut written = 0u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| DownloadError::NetworkError(e.to_string()))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| DownloadError::IoError(format!("{}: {}", part.display(), e)))?;
            written += chunk.len() as u64;
        }

        file.flush()
            .await
            .map_err(|e| DownloadError::IoError(format!("{}: {}", part.display(), e)))?;
        Ok(written)
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

/// `dest` 已存在且长度等于 `advertised` 时返回该长度
async fn complete_size(dest: &Path, advertised: Option<u64>) -> Option<u64> {
    let advertised = advertised?;
    let meta = tokio::fs::metadata(dest).await.ok()?;
    (meta.is_file() && meta.len() == advertised).then_some(advertised)
}

#[async_trait]
impl DownloaderPort for HttpDownloader {
    async fn fetch_text(&self, url: &str) -> Result<String, DownloadError> {
        let timeout = Duration::from_secs(self.config.manifest_timeout_secs);
        self.get(url, Some(timeout))
            .await?
            .text()
            .await
            .map_err(|e| DownloadError::NetworkError(e.to_string()))
    }

    async fn download_to(&self, url: &str, dest: &Path) -> Result<u64, DownloadError> {
        let response = self.get(url, None).await?;
        if let Some(size) = complete_size(dest, response.content_length()).await {
            tracing::info!(url, dest = %dest.display(), size, "File already present, skipping");
            return Ok(size);
        }
        tracing::debug!(url, size = ?response.content_length(), "Download started");

        let part = part_path(dest);
        match self.stream_to(response, &part).await {
            Ok(bytes) => {
                tokio::fs::rename(&part, dest)
                    .await
                    .map_err(|e| DownloadError::IoError(format!("{}: {}", dest.display(), e)))?;
                Ok(bytes)
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&part).await;
                Err(e)
            }
        }
    }
}
