//! Prompt Context - 工作流 JSON 与编号目录
//!
//! 工作流 JSON 对本系统是不透明的，只要求是合法 JSON，
//! 原样作为 `{"prompt": ...}` 请求体提交。

use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 工作流加载错误
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Failed to read prompt {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("Invalid prompt JSON {path}: {message}")]
    InvalidJson { path: PathBuf, message: String },
}

/// 一个待提交的工作流
#[derive(Debug, Clone)]
pub struct PromptSpec {
    path: PathBuf,
    graph: Value,
}

impl PromptSpec {
    pub fn new(path: impl Into<PathBuf>, graph: Value) -> Self {
        Self {
            path: path.into(),
            graph,
        }
    }

    /// 从文件内容解析
    pub fn from_slice(path: impl Into<PathBuf>, bytes: &[u8]) -> Result<Self, PromptError> {
        let path = path.into();
        let graph = serde_json::from_slice(bytes).map_err(|e| PromptError::InvalidJson {
            path: path.clone(),
            message: e.to_string(),
        })?;
        Ok(Self { path, graph })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn graph(&self) -> &Value {
        &self.graph
    }

    /// 文件名（用于日志和上报）
    pub fn name(&self) -> String {
        prompt_name(&self.path)
    }

    /// 提交到 `/prompt` 的请求体
    pub fn request_body(&self) -> Value {
        json!({ "prompt": self.graph })
    }
}

/// 路径的文件名部分
pub fn prompt_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// 编号解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptResolution {
    /// 编号对应的文件存在
    Exact(PathBuf),
    /// 文件缺失，改用上次成功的工作流
    Fallback { missing: PathBuf, substitute: PathBuf },
    /// 文件缺失且没有可用的回退
    Skip { missing: PathBuf },
}

/// 按编号模板枚举工作流文件
#[derive(Debug, Clone)]
pub struct PromptCatalog {
    dir: PathBuf,
    pattern: String,
}

impl PromptCatalog {
    /// `pattern` 中的 `{index}` 会被替换为编号
    pub fn new(dir: impl Into<PathBuf>, pattern: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            pattern: pattern.into(),
        }
    }

    pub fn path_for(&self, index: usize) -> PathBuf {
        self.dir
            .join(self.pattern.replace("{index}", &index.to_string()))
    }

    /// 解析编号对应的工作流
    ///
    /// 回退目标本身也必须存在，否则跳过该编号。
    pub fn resolve(
        &self,
        index: usize,
        last_success: Option<&Path>,
        exists: impl Fn(&Path) -> bool,
    ) -> PromptResolution {
        let expected = self.path_for(index);
        if exists(&expected) {
            return PromptResolution::Exact(expected);
        }

        match last_success {
            Some(prev) if exists(prev) => PromptResolution::Fallback {
                missing: expected,
                substitute: prev.to_path_buf(),
            },
            _ => PromptResolution::Skip { missing: expected },
        }
    }
}
