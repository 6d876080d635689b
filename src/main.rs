//! AICU Bench - ComfyUI 基准测试
//!
//! - `aicubench [--nodelete]`: 完整基准流程
//! - `aicubench submit`: 只上报已有的汇总

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use aicubench::application::ports::{GenerationServerPort, RunStatePort};
use aicubench::application::{
    BenchmarkServices, FetchModelsHandler, JobDriverConfig, ReadinessProber, RunBenchmark,
    RunBenchmarkConfig, RunBenchmarkHandler, RunJobHandler, SubmitResult, SubmitResultHandler,
};
use aicubench::config::{load_config_from_path, print_config, AppConfig, LogConfig};
use aicubench::infrastructure::adapters::{
    HttpComfyClient, HttpComfyClientConfig, HttpDownloader, HttpDownloaderConfig, HttpResultSink,
    HttpResultSinkConfig,
};
use aicubench::infrastructure::persistence::FileRunStateStore;
use aicubench::infrastructure::process::{
    BashScriptRunner, ComfyProvisioner, ComfyProvisionerConfig, ComfyServerConfig,
    ComfyServerLauncher,
};
use aicubench::infrastructure::system::SystemHostProbe;

#[derive(Parser)]
#[command(name = "aicubench")]
#[command(about = "ComfyUI image-generation benchmark", long_about = None)]
struct Cli {
    /// Keep artifacts: skip the cleanup script at the end of the run.
    #[arg(long, global = true)]
    nodelete: bool,

    /// Configuration file (defaults to aicubench.toml / aicubench.local.toml).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full benchmark pipeline (default).
    Run,
    /// Submit an existing benchmark summary and exit.
    Submit {
        /// Summary file (defaults to Artifacts/benchmark_summary.json).
        #[arg(long, value_name = "PATH")]
        summary: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 加载配置（优先级：COMFY_* > 环境变量 > 配置文件 > 默认值）
    let config = load_config_from_path(cli.config.as_deref())
        .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    init_tracing(&config.log);
    print_config(&config);

    let state: Arc<dyn RunStatePort> = Arc::new(FileRunStateStore::new(config.artifacts.dir.clone()));
    let reporter = build_reporter(&config, state.clone())?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Submit { summary } => {
            let summary_path = summary.unwrap_or_else(|| config.artifacts.summary_path());
            if !reporter.handle(SubmitResult { summary_path }).await {
                tracing::warn!("Nothing submitted");
            }
            Ok(())
        }
        Commands::Run => run_benchmark(&config, state, reporter, cli.nodelete).await,
    }
}

fn init_tracing(log: &LogConfig) {
    let log_filter = format!("{},aicubench={}", log.level, log.level);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter));

    if log.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn build_reporter(
    config: &AppConfig,
    state: Arc<dyn RunStatePort>,
) -> anyhow::Result<SubmitResultHandler> {
    let sink = Arc::new(HttpResultSink::new(HttpResultSinkConfig {
        endpoint: config.report.endpoint.clone(),
        timeout_secs: config.report.timeout_secs,
    })?);
    Ok(SubmitResultHandler::new(
        sink,
        state,
        config.report.schema_version.clone(),
    ))
}

async fn run_benchmark(
    config: &AppConfig,
    state: Arc<dyn RunStatePort>,
    reporter: SubmitResultHandler,
    no_delete: bool,
) -> anyhow::Result<()> {
    let comfy = &config.comfy;

    // ComfyUI HTTP 客户端
    let server: Arc<dyn GenerationServerPort> = Arc::new(HttpComfyClient::new(
        HttpComfyClientConfig::new(comfy.base_url()).with_timeout(comfy.request_timeout_secs),
    )?);

    let provisioner = Arc::new(ComfyProvisioner::new(ComfyProvisionerConfig {
        dir: comfy.dir.clone(),
        repo_url: comfy.repo_url.clone(),
        python: comfy.python.clone(),
    }));
    let launcher = Arc::new(ComfyServerLauncher::new(ComfyServerConfig {
        dir: comfy.dir.clone(),
        host: comfy.host.clone(),
        python: comfy.python.clone(),
        logs_dir: config.artifacts.logs_dir(),
    }));

    let downloader = Arc::new(HttpDownloader::new(HttpDownloaderConfig::default())?);
    let job_driver = RunJobHandler::new(
        server.clone(),
        JobDriverConfig {
            poll_interval: config.job.poll_interval(),
            poll_timeout: config.job.poll_timeout(),
            output_dir: config.job.output_dir.clone(),
        },
    );

    let services = BenchmarkServices {
        provisioner,
        launcher,
        server,
        prober: ReadinessProber::new(config.readiness.interval()),
        fetcher: FetchModelsHandler::new(downloader, comfy.dir.clone()),
        job_driver,
        reporter,
        host_probe: Arc::new(SystemHostProbe::new()),
        state,
        scripts: Arc::new(
            BashScriptRunner::new(".").with_env("ARTIFACTS_DIR", config.artifacts.dir.clone()),
        ),
    };
    let handler = RunBenchmarkHandler::new(RunBenchmarkConfig::from_app_config(config), services);

    // Ctrl-C 时放弃当前流程，服务进程随句柄一起被结束
    let report = tokio::select! {
        result = handler.handle(RunBenchmark { no_delete }) => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Received shutdown signal, aborting run");
            anyhow::bail!("interrupted");
        }
    };

    tracing::info!(
        succeeded = report.jobs_succeeded,
        failed = report.jobs_failed,
        skipped = report.jobs_skipped,
        "Benchmark complete"
    );
    Ok(())
}
