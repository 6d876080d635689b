//! Benchmark Summary - 上报前的汇总加工
//!
//! 汇总 JSON 由外部脚本生成；这里只负责补充提交元数据并压平成单层键值，
//! 以便接收端写入表格的一行。

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

/// 压平嵌套 JSON
///
/// 对象键用 `.` 连接，数组元素以下标作为键。空对象和空数组不产生任何键。
pub fn flatten(value: &Value) -> Map<String, Value> {
    let mut out = Map::new();
    flatten_into(value, String::new(), &mut out);
    out
}

fn flatten_into(value: &Value, prefix: String, out: &mut Map<String, Value>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                flatten_into(child, join_key(&prefix, key), out);
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                flatten_into(child, join_key(&prefix, &i.to_string()), out);
            }
        }
        leaf => {
            out.insert(prefix, leaf.clone());
        }
    }
}

fn join_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

/// 提交时合并进汇总的元数据
#[derive(Debug, Clone)]
pub struct SubmissionEnvelope {
    pub submission_id: Uuid,
    pub gpu_info: Option<Value>,
    pub last_prompt: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub schema_version: String,
}

impl SubmissionEnvelope {
    pub fn new(schema_version: impl Into<String>) -> Self {
        Self {
            submission_id: Uuid::new_v4(),
            gpu_info: None,
            last_prompt: None,
            submitted_at: Utc::now(),
            schema_version: schema_version.into(),
        }
    }

    pub fn with_gpu_info(mut self, gpu_info: Option<Value>) -> Self {
        self.gpu_info = gpu_info;
        self
    }

    pub fn with_last_prompt(mut self, last_prompt: Option<String>) -> Self {
        self.last_prompt = last_prompt;
        self
    }

    /// 合并到汇总对象，同名键会被覆盖
    pub fn apply(self, summary: &mut Map<String, Value>) {
        summary.insert(
            "submission_id".to_string(),
            Value::String(self.submission_id.to_string()),
        );
        if let Some(gpu) = self.gpu_info {
            summary.insert("gpu_info".to_string(), gpu);
        }
        if let Some(prompt) = self.last_prompt {
            summary.insert("last_prompt".to_string(), Value::String(prompt));
        }
        summary.insert(
            "submitted_at".to_string(),
            Value::String(self.submitted_at.to_rfc3339()),
        );
        summary.insert(
            "schema_version".to_string(),
            Value::String(self.schema_version),
        );
    }
}
