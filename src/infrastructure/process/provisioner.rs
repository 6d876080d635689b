//! ComfyUI Provisioner - 源码获取与依赖安装
//!
//! 源码树存在即视为已准备好，不做更新；依赖安装前先检查解释器版本。

use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use tokio::process::Command;

use crate::application::ports::{ProcessError, ProvisionOutcome, ProvisionerPort};

/// 兼容的解释器版本范围: [MIN, MAX)
const MIN_PYTHON: PythonVersion = PythonVersion::new(3, 9, 0);
const MAX_PYTHON: PythonVersion = PythonVersion::new(3, 13, 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PythonVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl PythonVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }

    pub fn is_supported(&self) -> bool {
        (MIN_PYTHON..MAX_PYTHON).contains(self)
    }
}

impl fmt::Display for PythonVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// 解析 `python --version` 输出，例如 `Python 3.11.4`、`Python 3.12.0rc1`
pub fn parse_python_version(output: &str) -> Option<PythonVersion> {
    let version = output
        .split_whitespace()
        .skip_while(|t| !t.eq_ignore_ascii_case("python"))
        .nth(1)?;

    let mut parts = version.split('.').map(|p| {
        let digits: String = p.chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse::<u32>().ok()
    });

    let major = parts.next()??;
    let minor = parts.next()??;
    let patch = parts.next().flatten().unwrap_or(0);
    Some(PythonVersion::new(major, minor, patch))
}

#[derive(Debug, Clone)]
pub struct ComfyProvisionerConfig {
    pub dir: PathBuf,
    pub repo_url: String,
    pub python: String,
}

pub struct ComfyProvisioner {
    config: ComfyProvisionerConfig,
}

impl ComfyProvisioner {
    pub fn new(config: ComfyProvisionerConfig) -> Self {
        Self { config }
    }

    async fn interpreter_version(&self) -> Result<PythonVersion, ProcessError> {
        let output = Command::new(&self.config.python)
            .arg("--version")
            .output()
            .await
            .map_err(|e| ProcessError::Spawn {
                program: self.config.python.clone(),
                message: e.to_string(),
            })?;

        // 旧版本把版本号打印到 stderr
        let text = format!(
            "{} {}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );

        parse_python_version(&text).ok_or_else(|| ProcessError::IncompatibleInterpreter {
            found: text.trim().to_string(),
            min: MIN_PYTHON.to_string(),
            max: MAX_PYTHON.to_string(),
        })
    }
}

#[async_trait]
impl ProvisionerPort for ComfyProvisioner {
    async fn ensure_source_tree(&self) -> Result<ProvisionOutcome, ProcessError> {
        if self.config.dir.is_dir() {
            return Ok(ProvisionOutcome::AlreadyPresent);
        }

        tracing::info!(
            repo = %self.config.repo_url,
            dir = %self.config.dir.display(),
            "Cloning server repository"
        );
        let status = Command::new("git")
            .arg("clone")
            .arg(&self.config.repo_url)
            .arg(&self.config.dir)
            .status()
            .await
            .map_err(|e| ProcessError::SourceUnavailable(format!("git: {}", e)))?;

        if !status.success() {
            return Err(ProcessError::SourceUnavailable(format!(
                "git clone {} exited with {}",
                self.config.repo_url, status
            )));
        }
        Ok(ProvisionOutcome::Fetched)
    }

    async fn install_dependencies(&self) -> Result<(), ProcessError> {
        let version = self.interpreter_version().await?;
        if !version.is_supported() {
            return Err(ProcessError::IncompatibleInterpreter {
                found: version.to_string(),
                min: MIN_PYTHON.to_string(),
                max: MAX_PYTHON.to_string(),
            });
        }
        tracing::info!(python = %version, "Interpreter version supported");

        let requirements = self.config.dir.join("requirements.txt");
        if !requirements.is_file() {
            tracing::warn!(path = %requirements.display(), "No requirements file, skipping install");
            return Ok(());
        }

        let status = Command::new(&self.config.python)
            .args(["-m", "pip", "install", "-r", "requirements.txt"])
            .current_dir(&self.config.dir)
            .status()
            .await
            .map_err(|e| ProcessError::Spawn {
                program: self.config.python.clone(),
                message: e.to_string(),
            })?;

        if !status.success() {
            return Err(ProcessError::CommandFailed {
                command: "pip install -r requirements.txt".to_string(),
                status: status.to_string(),
            });
        }
        tracing::info!("Server dependencies installed");
        Ok(())
    }
}
