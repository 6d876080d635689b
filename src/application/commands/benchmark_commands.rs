//! Benchmark Commands

use std::path::PathBuf;

use crate::domain::PromptSpec;

/// 执行完整基准流程
#[derive(Debug, Clone, Default)]
pub struct RunBenchmark {
    /// 保留产物，跳过结束时的清理脚本
    pub no_delete: bool,
}

/// 下载模型清单中的所有文件
#[derive(Debug, Clone)]
pub struct FetchModels {
    pub manifest_url: String,
}

/// 执行单个工作流
#[derive(Debug, Clone)]
pub struct RunJob {
    pub prompt: PromptSpec,
}

/// 上报汇总（每个产物目录只成功一次）
#[derive(Debug, Clone)]
pub struct SubmitResult {
    pub summary_path: PathBuf,
}
