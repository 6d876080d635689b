//! Fetch Models Handler - 模型清单下载
//!
//! 只有清单本身取不到才算失败；单行格式错误、网络或写入失败都记录后跳过。

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::application::commands::FetchModels;
use crate::application::ports::{DownloadError, DownloaderPort};
use crate::domain::manifest::{parse_manifest, ManifestLine};

/// 已下载文件
#[derive(Debug, Clone, Serialize)]
pub struct FetchedFile {
    pub path: PathBuf,
    pub bytes: u64,
    pub elapsed_secs: f64,
}

/// 下载报告
#[derive(Debug, Clone, Default, Serialize)]
pub struct FetchReport {
    /// 以关键字开头的指令行数
    pub directives: usize,
    pub downloaded: usize,
    pub malformed: usize,
    pub failed: usize,
    pub files: Vec<FetchedFile>,
    pub elapsed_secs: f64,
}

impl FetchReport {
    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.bytes).sum()
    }
}

pub struct FetchModelsHandler {
    downloader: Arc<dyn DownloaderPort>,
    install_dir: PathBuf,
}

impl FetchModelsHandler {
    pub fn new(downloader: Arc<dyn DownloaderPort>, install_dir: impl Into<PathBuf>) -> Self {
        Self {
            downloader,
            install_dir: install_dir.into(),
        }
    }

    pub async fn handle(&self, cmd: FetchModels) -> Result<FetchReport, DownloadError> {
        let started = Instant::now();
        tracing::info!(url = %cmd.manifest_url, "Downloading model manifest");

        let manifest = self.downloader.fetch_text(&cmd.manifest_url).await.map_err(|e| {
            tracing::error!(url = %cmd.manifest_url, error = %e, "Failed to fetch model manifest");
            e
        })?;

        let mut report = FetchReport::default();

        for line in parse_manifest(&manifest) {
            report.directives += 1;

            let directive = match line {
                ManifestLine::Directive(d) => d,
                ManifestLine::Malformed(raw) => {
                    tracing::warn!(line = %raw, "Malformed download line, skipping");
                    report.malformed += 1;
                    continue;
                }
                ManifestLine::Ignored => continue,
            };

            let dest_dir = directive.dest_dir(&self.install_dir);
            if let Err(e) = tokio::fs::create_dir_all(&dest_dir).await {
                tracing::error!(dir = %dest_dir.display(), error = %e, "Cannot create model directory");
                report.failed += 1;
                continue;
            }

            let dest = dest_dir.join(&directive.filename);
            let file_started = Instant::now();
            tracing::info!(url = %directive.url, dest = %dest.display(), "Downloading model");

            match self.downloader.download_to(&directive.url, &dest).await {
                Ok(bytes) => {
                    let elapsed = file_started.elapsed();
                    tracing::info!(
                        dest = %dest.display(),
                        bytes,
                        elapsed_secs = %format!("{:.2}", elapsed.as_secs_f64()),
                        "Model downloaded"
                    );
                    report.downloaded += 1;
                    report.files.push(FetchedFile {
                        path: dest,
                        bytes,
                        elapsed_secs: elapsed.as_secs_f64(),
                    });
                }
                Err(e) => {
                    tracing::error!(url = %directive.url, error = %e, "Model download failed");
                    report.failed += 1;
                }
            }
        }

        report.elapsed_secs = started.elapsed().as_secs_f64();
        tracing::info!(
            directives = report.directives,
            downloaded = report.downloaded,
            malformed = report.malformed,
            failed = report.failed,
            total_bytes = report.total_bytes(),
            elapsed = ?Duration::from_secs_f64(report.elapsed_secs),
            "Model download finished"
        );

        Ok(report)
    }
}
