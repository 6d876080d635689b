//! Job Context - 单次生成任务
//!
//! 状态机: SUBMITTED → POLLING → {COMPLETED | TIMED_OUT | FAILED}

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

/// 服务端分配的任务 ID（`prompt_id`）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Submitted,
    Polling,
    Completed,
    TimedOut,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::TimedOut | Self::Failed)
    }
}

/// 输出图片描述
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ImageDescriptor {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub subfolder: String,
    #[serde(default = "default_image_type", rename = "type")]
    pub image_type: String,
}

fn default_image_type() -> String {
    "output".to_string()
}

impl ImageDescriptor {
    /// 本地保存用的文件名，只取最后一段防止路径穿越
    pub fn local_name(&self) -> Option<String> {
        let name = self.filename.as_deref()?.trim();
        if name.is_empty() {
            return None;
        }
        Path::new(name)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
    }
}

/// 从 `/prompt` 的 200 响应提取 `prompt_id`
pub fn extract_prompt_id(body: &Value) -> Option<JobId> {
    match body.get("prompt_id")? {
        Value::String(s) if !s.is_empty() => Some(JobId::new(s.clone())),
        Value::Number(n) => Some(JobId::new(n.to_string())),
        _ => None,
    }
}

/// history 响应中的完成输出
///
/// 只有 `{<id>: {"outputs": ...}}` 才算完成。
pub fn completed_outputs<'a>(history: &'a Value, job_id: &JobId) -> Option<&'a Value> {
    history.get(job_id.as_str())?.get("outputs")
}

/// 收集所有节点输出中的图片描述
///
/// 无法解析的条目保留为空描述，由下载方记录并跳过。
pub fn collect_images(outputs: &Value) -> Vec<ImageDescriptor> {
    let Some(nodes) = outputs.as_object() else {
        return Vec::new();
    };

    nodes
        .values()
        .filter_map(|node| node.get("images").and_then(Value::as_array))
        .flatten()
        .map(|entry| serde_json::from_value(entry.clone()).unwrap_or_default())
        .collect()
}

/// 单次任务的结果
#[derive(Debug, Clone, Serialize)]
pub struct JobResult {
    /// 工作流文件名
    pub prompt_name: String,
    /// `/prompt` 的 HTTP 状态码
    pub submit_status: Option<u16>,
    pub job_id: Option<JobId>,
    pub state: JobState,
    /// 完成时的节点输出
    pub outputs: Option<Value>,
    /// 成功保存的图片数
    pub images_saved: usize,
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
}

impl JobResult {
    pub fn new(prompt_name: impl Into<String>) -> Self {
        Self {
            prompt_name: prompt_name.into(),
            submit_status: None,
            job_id: None,
            state: JobState::Submitted,
            outputs: None,
            images_saved: 0,
            elapsed: Duration::ZERO,
        }
    }

    pub fn is_success(&self) -> bool {
        self.state == JobState::Completed
    }
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }
}
