//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// ComfyUI 服务配置
    #[serde(default)]
    pub comfy: ComfyConfig,

    /// 就绪探测配置
    #[serde(default)]
    pub readiness: ReadinessConfig,

    /// 单个生成任务配置
    #[serde(default)]
    pub job: JobConfig,

    /// 模型下载配置
    #[serde(default)]
    pub models: ModelsConfig,

    /// 基准运行配置
    #[serde(default)]
    pub bench: BenchConfig,

    /// 结果上报配置
    #[serde(default)]
    pub report: ReportConfig,

    /// 本地产物目录配置
    #[serde(default)]
    pub artifacts: ArtifactsConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// ComfyUI 服务配置
#[derive(Debug, Clone, Deserialize)]
pub struct ComfyConfig {
    /// 源码安装目录（环境变量 `COMFY_DIR`）
    #[serde(default = "default_comfy_dir")]
    pub dir: PathBuf,

    /// 监听地址，只绑定回环
    #[serde(default = "default_comfy_host")]
    pub host: String,

    /// 监听端口（环境变量 `COMFY_PORT`）
    #[serde(default = "default_comfy_port")]
    pub port: u16,

    /// 源码仓库地址
    #[serde(default = "default_repo_url")]
    pub repo_url: String,

    /// Python 解释器
    #[serde(default = "default_python")]
    pub python: String,

    /// 优雅关闭等待时间（秒）
    #[serde(default = "default_stop_grace")]
    pub stop_grace_secs: u64,

    /// 单次 HTTP 请求超时（秒）
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_comfy_dir() -> PathBuf {
    PathBuf::from("./ComfyUI")
}

fn default_comfy_host() -> String {
    "127.0.0.1".to_string()
}

fn default_comfy_port() -> u16 {
    8188
}

fn default_repo_url() -> String {
    "https://github.com/comfyanonymous/ComfyUI.git".to_string()
}

fn default_python() -> String {
    "python".to_string()
}

fn default_stop_grace() -> u64 {
    5
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ComfyConfig {
    fn default() -> Self {
        Self {
            dir: default_comfy_dir(),
            host: default_comfy_host(),
            port: default_comfy_port(),
            repo_url: default_repo_url(),
            python: default_python(),
            stop_grace_secs: default_stop_grace(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ComfyConfig {
    /// 服务 Base URL
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// 就绪探测配置
#[derive(Debug, Clone, Deserialize)]
pub struct ReadinessConfig {
    /// 探测间隔（毫秒）
    #[serde(default = "default_probe_interval")]
    pub interval_ms: u64,

    /// 正式启动后的就绪超时（秒）
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_secs: u64,

    /// 冒烟测试的就绪超时（秒）
    #[serde(default = "default_smoke_timeout")]
    pub smoke_timeout_secs: u64,
}

fn default_probe_interval() -> u64 {
    500
}

fn default_startup_timeout() -> u64 {
    20
}

fn default_smoke_timeout() -> u64 {
    10
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_probe_interval(),
            startup_timeout_secs: default_startup_timeout(),
            smoke_timeout_secs: default_smoke_timeout(),
        }
    }
}

impl ReadinessConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    pub fn smoke_timeout(&self) -> Duration {
        Duration::from_secs(self.smoke_timeout_secs)
    }
}

/// 生成任务配置
#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    /// history 轮询间隔（毫秒）
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// history 轮询总预算（秒）
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,

    /// 输出图片目录
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_poll_interval() -> u64 {
    2000
}

fn default_poll_timeout() -> u64 {
    120
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("Artifacts/outputs")
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            poll_timeout_secs: default_poll_timeout(),
            output_dir: default_output_dir(),
        }
    }
}

impl JobConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }
}

/// 模型下载配置
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    /// 是否下载模型
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// 模型清单 URL（每行一条 wget 指令）
    #[serde(default = "default_manifest_url")]
    pub manifest_url: String,
}

fn default_true() -> bool {
    true
}

fn default_manifest_url() -> String {
    "https://raw.githubusercontent.com/aicuai/Book-SD-MasterGuide/main/basemodels.txt".to_string()
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            manifest_url: default_manifest_url(),
        }
    }
}

/// 基准运行配置
#[derive(Debug, Clone, Deserialize)]
pub struct BenchConfig {
    /// 任务编号上限（0..max_jobs）
    #[serde(default = "default_max_jobs")]
    pub max_jobs: usize,

    /// 工作流 JSON 目录
    #[serde(default = "default_prompt_dir")]
    pub prompt_dir: PathBuf,

    /// 工作流文件名模板，`{index}` 会被替换为编号
    #[serde(default = "default_prompt_pattern")]
    pub prompt_pattern: String,

    /// 是否在下载模型前做一次就绪冒烟测试
    #[serde(default = "default_true")]
    pub smoke_test: bool,

    /// 生成 benchmark_summary.json 的外部脚本
    #[serde(default)]
    pub summary_script: Option<PathBuf>,

    /// 运行结束后的清理脚本
    #[serde(default = "default_cleanup_script")]
    pub cleanup_script: PathBuf,
}

fn default_max_jobs() -> usize {
    100
}

fn default_prompt_dir() -> PathBuf {
    PathBuf::from("workflows")
}

fn default_prompt_pattern() -> String {
    "workflow_{index}.json".to_string()
}

fn default_cleanup_script() -> PathBuf {
    PathBuf::from("scripts/clean.sh")
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            max_jobs: default_max_jobs(),
            prompt_dir: default_prompt_dir(),
            prompt_pattern: default_prompt_pattern(),
            smoke_test: true,
            summary_script: None,
            cleanup_script: default_cleanup_script(),
        }
    }
}

/// 结果上报配置
#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    /// 表格接收端点
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// 上报数据的 schema 版本
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    /// 请求超时（秒）
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

fn default_endpoint() -> String {
    "https://script.google.com/macros/s/AKfycbwJrEtqFu2cW-rFqBqXRIIEsuuajH-of5PUlYha97yOaRQ1681-T3xSfEHInlbW5dPT/exec".to_string()
}

fn default_schema_version() -> String {
    "1.0".to_string()
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            schema_version: default_schema_version(),
            timeout_secs: default_request_timeout(),
        }
    }
}

/// 本地产物目录配置
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactsConfig {
    /// 产物根目录
    #[serde(default = "default_artifacts_dir")]
    pub dir: PathBuf,
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("Artifacts")
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            dir: default_artifacts_dir(),
        }
    }
}

impl ArtifactsConfig {
    /// 外部脚本写入的汇总文件
    pub fn summary_path(&self) -> PathBuf {
        self.dir.join("benchmark_summary.json")
    }

    /// 服务进程日志目录
    pub fn logs_dir(&self) -> PathBuf {
        self.dir.join("logs")
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
