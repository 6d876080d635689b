//! Run Job Handler - 单个工作流的提交、轮询与图片收取
//!
//! SUBMITTED → POLLING → {COMPLETED | TIMED_OUT | FAILED}
//! 所有传输错误都在此处转换为状态，不向上传播。

use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::application::commands::RunJob;
use crate::application::ports::GenerationServerPort;
use crate::domain::job::{collect_images, completed_outputs, extract_prompt_id};
use crate::domain::{JobId, JobResult, JobState};

/// 请求体日志预览长度
const PAYLOAD_PREVIEW_CHARS: usize = 500;

/// Job Driver 配置
#[derive(Debug, Clone)]
pub struct JobDriverConfig {
    /// history 轮询间隔
    pub poll_interval: Duration,
    /// history 轮询总预算
    pub poll_timeout: Duration,
    /// 输出图片目录
    pub output_dir: PathBuf,
}

impl Default for JobDriverConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            poll_timeout: Duration::from_secs(120),
            output_dir: PathBuf::from("Artifacts/outputs"),
        }
    }
}

pub struct RunJobHandler {
    server: Arc<dyn GenerationServerPort>,
    config: JobDriverConfig,
}

impl RunJobHandler {
    pub fn new(server: Arc<dyn GenerationServerPort>, config: JobDriverConfig) -> Self {
        Self { server, config }
    }

    pub async fn handle(&self, cmd: RunJob) -> JobResult {
        let started = Instant::now();
        let prompt = cmd.prompt;
        let mut result = JobResult::new(prompt.name());

        tracing::info!(prompt = %result.prompt_name, "Submitting prompt");

        let Some(job_id) = self.submit(&prompt.request_body(), &mut result).await else {
            result.state = JobState::Failed;
            result.elapsed = started.elapsed();
            return result;
        };
        result.job_id = Some(job_id.clone());
        self.transition(&mut result, JobState::Polling);

        match self.poll(&job_id).await {
            Some(outputs) => {
                result.images_saved = self.harvest(&outputs).await;
                result.outputs = Some(outputs);
                self.transition(&mut result, JobState::Completed);
            }
            None => {
                tracing::warn!(job_id = %job_id, "No history data");
                self.transition(&mut result, JobState::TimedOut);
            }
        }

        result.elapsed = started.elapsed();
        tracing::info!(
            prompt = %result.prompt_name,
            job_id = %job_id,
            state = ?result.state,
            images = result.images_saved,
            elapsed_secs = %format!("{:.2}", result.elapsed.as_secs_f64()),
            "Job finished"
        );
        result
    }

    fn transition(&self, result: &mut JobResult, state: JobState) {
        tracing::debug!(
            prompt = %result.prompt_name,
            old_state = ?result.state,
            new_state = ?state,
            "Job state changed"
        );
        result.state = state;
    }

    /// POST /prompt，只有带 `prompt_id` 的 200 响应才返回 ID
    async fn submit(&self, body: &Value, result: &mut JobResult) -> Option<JobId> {
        let preview: String = body.to_string().chars().take(PAYLOAD_PREVIEW_CHARS).collect();
        tracing::debug!(payload = %preview, "Payload preview (truncated)");

        let reply = match self.server.submit_prompt(body).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(url = %self.server.base_url(), error = %e, "Failed to submit prompt");
                return None;
            }
        };

        result.submit_status = Some(reply.status);
        if !(200..300).contains(&reply.status) {
            tracing::error!(
                status = reply.status,
                body = ?reply.body,
                "Prompt rejected by server"
            );
            return None;
        }

        let job_id = reply
            .body
            .as_ref()
            .filter(|_| reply.is_ok())
            .and_then(extract_prompt_id);

        match job_id {
            Some(id) => {
                tracing::info!(job_id = %id, status = reply.status, "Prompt accepted");
                Some(id)
            }
            None => {
                tracing::error!(
                    status = reply.status,
                    body = ?reply.body,
                    "Response carries no prompt_id"
                );
                None
            }
        }
    }

    /// 轮询 history，直到出现 `outputs` 或预算耗尽
    async fn poll(&self, job_id: &JobId) -> Option<Value> {
        let started = Instant::now();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.server.history(job_id).await {
                Ok(reply) if reply.is_ok() => {
                    if let Some(outputs) = reply
                        .body
                        .as_ref()
                        .and_then(|h| completed_outputs(h, job_id))
                    {
                        tracing::info!(
                            job_id = %job_id,
                            attempt,
                            elapsed_secs = %format!("{:.2}", started.elapsed().as_secs_f64()),
                            "Job completed"
                        );
                        return Some(outputs.clone());
                    }
                    tracing::debug!(job_id = %job_id, attempt, "Job still running");
                }
                Ok(reply) => {
                    tracing::debug!(job_id = %job_id, attempt, status = reply.status, "History not available");
                }
                Err(e) => {
                    tracing::debug!(job_id = %job_id, attempt, error = %e, "History request failed");
                }
            }

            if started.elapsed() + self.config.poll_interval > self.config.poll_timeout {
                tracing::error!(
                    job_id = %job_id,
                    timeout_secs = self.config.poll_timeout.as_secs_f64(),
                    "Timed out waiting for job"
                );
                return None;
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// 下载所有输出图片，返回成功保存的数量
    pub async fn harvest(&self, outputs: &Value) -> usize {
        let images = collect_images(outputs);
        if images.is_empty() {
            tracing::info!("Job produced no images");
            return 0;
        }

        if let Err(e) = tokio::fs::create_dir_all(&self.config.output_dir).await {
            tracing::error!(
                dir = %self.config.output_dir.display(),
                error = %e,
                "Cannot create output directory"
            );
            return 0;
        }

        let mut saved = 0;
        for image in &images {
            let Some(name) = image.local_name() else {
                tracing::warn!(image = ?image, "Image descriptor without filename, skipping");
                continue;
            };

            let reply = match self.server.view(image).await {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::error!(filename = %name, error = %e, "Failed to download image");
                    continue;
                }
            };
            if !reply.is_ok() {
                tracing::warn!(filename = %name, status = reply.status, "Image not available");
                continue;
            }

            let path = self.config.output_dir.join(&name);
            match tokio::fs::write(&path, &reply.body).await {
                Ok(()) => {
                    tracing::info!(path = %path.display(), bytes = reply.body.len(), "Image saved");
                    saved += 1;
                }
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "Failed to write image");
                }
            }
        }

        tracing::info!(saved, total = images.len(), "Images harvested");
        saved
    }
}
