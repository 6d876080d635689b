//! Environment Ports - 源码准备、依赖安装与外部脚本

use async_trait::async_trait;
use std::path::Path;

use super::server_process::ProcessError;

/// 源码树准备结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    AlreadyPresent,
    Fetched,
}

/// Provisioner Port
#[async_trait]
pub trait ProvisionerPort: Send + Sync {
    /// 源码树不存在时获取；已存在则什么也不做
    async fn ensure_source_tree(&self) -> Result<ProvisionOutcome, ProcessError>;

    /// 安装服务声明的依赖
    ///
    /// 解释器版本不兼容时返回 `ProcessError::IncompatibleInterpreter`。
    async fn install_dependencies(&self) -> Result<(), ProcessError>;
}

/// Script Runner Port - 外部协作脚本（汇总、清理）
#[async_trait]
pub trait ScriptRunnerPort: Send + Sync {
    async fn run(&self, script: &Path) -> Result<(), ProcessError>;
}
