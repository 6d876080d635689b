//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. `COMFY_DIR` / `COMFY_PORT`
//! 2. 环境变量（前缀 `AICUBENCH_`）
//! 3. 配置文件（aicubench.toml）
//! 4. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::AppConfig;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["aicubench", "aicubench.local"];

/// 加载应用配置
///
/// # 环境变量示例
/// - `COMFY_DIR=/opt/ComfyUI`
/// - `COMFY_PORT=8181`
/// - `AICUBENCH_JOB__POLL_TIMEOUT_SECS=300`
/// - `AICUBENCH_BENCH__MAX_JOBS=10`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 默认值（最低优先级）
    builder = builder
        .set_default("comfy.dir", "./ComfyUI")?
        .set_default("comfy.host", "127.0.0.1")?
        .set_default("comfy.port", 8188)?
        .set_default("comfy.python", "python")?
        .set_default("comfy.stop_grace_secs", 5)?
        .set_default("readiness.interval_ms", 500)?
        .set_default("readiness.startup_timeout_secs", 20)?
        .set_default("readiness.smoke_timeout_secs", 10)?
        .set_default("job.poll_interval_ms", 2000)?
        .set_default("job.poll_timeout_secs", 120)?
        .set_default("bench.max_jobs", 100)?
        .set_default("artifacts.dir", "Artifacts")?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    // 2. 配置文件
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 环境变量: AICUBENCH_COMFY__PORT=8181
    builder = builder.add_source(
        Environment::with_prefix("AICUBENCH")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    // 4. 历史沿用的环境变量
    builder = builder
        .set_override_option("comfy.dir", std::env::var("COMFY_DIR").ok())?
        .set_override_option("comfy.port", std::env::var("COMFY_PORT").ok())?;

    let config = builder.build()?;

    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.comfy.port == 0 {
        return Err(ConfigError::ValidationError(
            "ComfyUI port cannot be 0".to_string(),
        ));
    }

    if config.bench.max_jobs == 0 {
        return Err(ConfigError::ValidationError(
            "bench.max_jobs must be at least 1".to_string(),
        ));
    }

    if !config.bench.prompt_pattern.contains("{index}") {
        return Err(ConfigError::ValidationError(
            "bench.prompt_pattern must contain {index}".to_string(),
        ));
    }

    if config.models.enabled && config.models.manifest_url.is_empty() {
        return Err(ConfigError::ValidationError(
            "Model manifest URL cannot be empty".to_string(),
        ));
    }

    if config.report.endpoint.is_empty() {
        return Err(ConfigError::ValidationError(
            "Report endpoint cannot be empty".to_string(),
        ));
    }

    if config.readiness.interval_ms == 0 || config.job.poll_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "Poll intervals cannot be 0".to_string(),
        ));
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Benchmark Configuration ===");
    tracing::info!("ComfyUI Dir: {:?}", config.comfy.dir);
    tracing::info!("ComfyUI URL: {}", config.comfy.base_url());
    tracing::info!(
        "Readiness: every {}ms, startup timeout {}s",
        config.readiness.interval_ms,
        config.readiness.startup_timeout_secs
    );
    tracing::info!(
        "Job Poll: every {}ms, timeout {}s",
        config.job.poll_interval_ms,
        config.job.poll_timeout_secs
    );
    if config.models.enabled {
        tracing::info!("Model Manifest: {}", config.models.manifest_url);
    }
    tracing::info!(
        "Prompts: {:?}/{} (max {})",
        config.bench.prompt_dir,
        config.bench.prompt_pattern,
        config.bench.max_jobs
    );
    tracing::info!("Artifacts: {:?}", config.artifacts.dir);
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("===============================");
}
