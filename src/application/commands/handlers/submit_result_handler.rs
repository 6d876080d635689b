//! Submit Result Handler - 汇总上报
//!
//! 标记文件存在即视为已提交；只有接收端返回 200 才创建标记，
//! 其他结果都保留重试机会。

use serde_json::{Map, Value};
use std::sync::Arc;

use crate::application::commands::SubmitResult;
use crate::application::ports::{ResultSinkPort, RunStatePort};
use crate::domain::prompt::prompt_name;
use crate::domain::{flatten, SubmissionEnvelope};

pub struct SubmitResultHandler {
    sink: Arc<dyn ResultSinkPort>,
    state: Arc<dyn RunStatePort>,
    schema_version: String,
}

impl SubmitResultHandler {
    pub fn new(
        sink: Arc<dyn ResultSinkPort>,
        state: Arc<dyn RunStatePort>,
        schema_version: impl Into<String>,
    ) -> Self {
        Self {
            sink,
            state,
            schema_version: schema_version.into(),
        }
    }

    /// 上报一次，成功提交返回 true
    pub async fn handle(&self, cmd: SubmitResult) -> bool {
        let path = &cmd.summary_path;

        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            tracing::warn!(path = %path.display(), "Benchmark summary not found, nothing to submit");
            return false;
        }

        if self.state.marker_exists().await {
            tracing::info!("Result already submitted for this run, skipping");
            return false;
        }

        let mut summary = match self.load_summary(&cmd).await {
            Some(summary) => summary,
            None => return false,
        };

        let gpu_info = match self.state.load_gpu_info().await {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable GPU info");
                None
            }
        };
        let last_prompt = match self.state.load_last_success().await {
            Ok(prompt) => prompt.map(|p| prompt_name(&p)),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable last-success record");
                None
            }
        };

        let envelope = SubmissionEnvelope::new(self.schema_version.clone())
            .with_gpu_info(gpu_info)
            .with_last_prompt(last_prompt);
        let submission_id = envelope.submission_id;
        envelope.apply(&mut summary);

        let row = flatten(&Value::Object(summary));
        tracing::info!(submission_id = %submission_id, fields = row.len(), "Submitting benchmark result");

        match self.sink.post(&row).await {
            Ok(200) => {
                if let Err(e) = self.state.create_marker().await {
                    tracing::error!(error = %e, "Result submitted but marker could not be written");
                }
                tracing::info!(submission_id = %submission_id, "Result submitted");
                true
            }
            Ok(status) => {
                tracing::error!(submission_id = %submission_id, status, "Result rejected by endpoint");
                false
            }
            Err(e) => {
                tracing::error!(submission_id = %submission_id, error = %e, "Failed to submit result");
                false
            }
        }
    }

    async fn load_summary(&self, cmd: &SubmitResult) -> Option<Map<String, Value>> {
        let path = &cmd.summary_path;
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Failed to read summary");
                return None;
            }
        };

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(map)) => Some(map),
            Ok(_) => {
                tracing::error!(path = %path.display(), "Summary is not a JSON object");
                None
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Failed to parse summary");
                None
            }
        }
    }
}
