//! Run Benchmark Handler - 基准流程编排
//!
//! 顺序执行，逐步容错:
//! 1. 准备源码树
//! 2. 安装依赖（解释器版本不兼容时终止）
//! 3. 就绪冒烟测试
//! 4. 下载模型
//! 5. 采集主机 / GPU 信息
//! 6. 启动服务并等待就绪（超时则停止服务并终止）
//! 7. 逐个编号执行工作流，缺失时回退到上次成功的工作流
//! 8. 无论循环如何结束都停止服务
//! 9. 未指定保留产物时运行清理脚本

use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{FetchModelsHandler, FetchedFile, RunJobHandler, SubmitResultHandler};
use crate::application::commands::{FetchModels, RunBenchmark, RunJob, SubmitResult};
use crate::application::error::ApplicationError;
use crate::application::lifecycle::ServerScope;
use crate::application::ports::{
    GenerationServerPort, HostProbePort, ProcessError, ProvisionOutcome, ProvisionerPort,
    RunStatePort, ScriptRunnerPort, ServerLauncherPort,
};
use crate::application::readiness::ReadinessProber;
use crate::config::AppConfig;
use crate::domain::{PromptCatalog, PromptResolution, PromptSpec};

/// 编排配置
#[derive(Debug, Clone)]
pub struct RunBenchmarkConfig {
    pub port: u16,
    pub stop_grace: Duration,
    pub startup_timeout: Duration,
    pub smoke_test: bool,
    pub smoke_timeout: Duration,
    /// None 表示跳过模型下载
    pub manifest_url: Option<String>,
    pub max_jobs: usize,
    pub catalog: PromptCatalog,
    pub summary_path: PathBuf,
    pub summary_script: Option<PathBuf>,
    pub cleanup_script: PathBuf,
}

impl RunBenchmarkConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            port: config.comfy.port,
            stop_grace: config.comfy.stop_grace(),
            startup_timeout: config.readiness.startup_timeout(),
            smoke_test: config.bench.smoke_test,
            smoke_timeout: config.readiness.smoke_timeout(),
            manifest_url: config
                .models
                .enabled
                .then(|| config.models.manifest_url.clone()),
            max_jobs: config.bench.max_jobs,
            catalog: PromptCatalog::new(
                config.bench.prompt_dir.clone(),
                config.bench.prompt_pattern.clone(),
            ),
            summary_path: config.artifacts.summary_path(),
            summary_script: config.bench.summary_script.clone(),
            cleanup_script: config.bench.cleanup_script.clone(),
        }
    }
}

/// 编排所需的全部协作方
pub struct BenchmarkServices {
    pub provisioner: Arc<dyn ProvisionerPort>,
    pub launcher: Arc<dyn ServerLauncherPort>,
    pub server: Arc<dyn GenerationServerPort>,
    pub prober: ReadinessProber,
    pub fetcher: FetchModelsHandler,
    pub job_driver: RunJobHandler,
    pub reporter: SubmitResultHandler,
    pub host_probe: Arc<dyn HostProbePort>,
    pub state: Arc<dyn RunStatePort>,
    pub scripts: Arc<dyn ScriptRunnerPort>,
}

/// 循环状态
#[derive(Debug, Default)]
struct RunState {
    last_success: Option<PathBuf>,
    report: RunReport,
}

/// 单个任务的记录
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub index: usize,
    pub prompt: String,
    pub fallback: bool,
    pub state: String,
    pub images_saved: usize,
    pub elapsed_secs: f64,
}

/// 运行报告
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub jobs_attempted: usize,
    pub jobs_succeeded: usize,
    pub jobs_failed: usize,
    pub jobs_skipped: usize,
    pub fallbacks: usize,
    pub submissions: usize,
    pub last_success: Option<PathBuf>,
    pub server_startup_secs: Option<f64>,
    pub model_download_secs: Option<f64>,
    pub model_files: Vec<FetchedFile>,
    pub jobs: Vec<JobRecord>,
}

pub struct RunBenchmarkHandler {
    config: RunBenchmarkConfig,
    services: BenchmarkServices,
}

impl RunBenchmarkHandler {
    pub fn new(config: RunBenchmarkConfig, services: BenchmarkServices) -> Self {
        Self { config, services }
    }

    pub async fn handle(&self, cmd: RunBenchmark) -> Result<RunReport, ApplicationError> {
        tracing::info!("Starting benchmark run");
        let outcome = self.run_pipeline().await;

        if let Err(e) = &outcome {
            tracing::error!(error = %e, "Benchmark run aborted");
        }

        if cmd.no_delete {
            tracing::info!("--nodelete given, keeping artifacts");
        } else {
            self.run_script("cleanup", &self.config.cleanup_script).await;
        }

        outcome
    }

    async fn run_pipeline(&self) -> Result<RunReport, ApplicationError> {
        let mut state = RunState::default();

        self.provision().await?;

        if self.config.smoke_test {
            self.smoke_test().await;
        }

        if let Some(url) = &self.config.manifest_url {
            let fetch = self
                .services
                .fetcher
                .handle(FetchModels {
                    manifest_url: url.clone(),
                })
                .await?;
            state.report.model_download_secs = Some(fetch.elapsed_secs);
            state.report.model_files = fetch.files;
        }

        self.collect_host_info().await;

        state.last_success = self.recover_last_success().await;

        let launched = Instant::now();
        let scope = ServerScope::start(
            self.services.launcher.as_ref(),
            self.config.port,
            self.config.stop_grace,
        )
        .await?;

        let loop_result = scope
            .run(async {
                let ready = self
                    .services
                    .prober
                    .wait_until_ready(self.services.server.as_ref(), self.config.startup_timeout)
                    .await;
                if !ready {
                    return Err(ApplicationError::NotReady {
                        url: self.services.server.base_url().to_string(),
                        timeout_secs: self.config.startup_timeout.as_secs(),
                    });
                }

                let startup = launched.elapsed().as_secs_f64();
                tracing::info!(startup_secs = %format!("{:.2}", startup), "Server started");
                state.report.server_startup_secs = Some(startup);

                self.run_jobs(&mut state).await
            })
            .await;

        self.save_timings(&state.report).await;
        loop_result?;

        state.report.last_success = state.last_success.clone();
        tracing::info!(
            attempted = state.report.jobs_attempted,
            succeeded = state.report.jobs_succeeded,
            failed = state.report.jobs_failed,
            skipped = state.report.jobs_skipped,
            submissions = state.report.submissions,
            "Benchmark run finished"
        );
        Ok(state.report)
    }

    /// 步骤 1、2
    async fn provision(&self) -> Result<(), ApplicationError> {
        match self.services.provisioner.ensure_source_tree().await {
            Ok(ProvisionOutcome::AlreadyPresent) => {
                tracing::info!("Server source tree already present")
            }
            Ok(ProvisionOutcome::Fetched) => tracing::info!("Server source tree fetched"),
            Err(e) => {
                tracing::error!(error = %e, "Cannot obtain server source tree");
                return Err(ApplicationError::Provisioning(e.to_string()));
            }
        }

        match self.services.provisioner.install_dependencies().await {
            Ok(()) => Ok(()),
            Err(e @ ProcessError::IncompatibleInterpreter { .. }) => {
                tracing::error!(error = %e, "Interpreter outside supported range");
                Err(e.into())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Dependency installation failed, continuing");
                Ok(())
            }
        }
    }

    /// 步骤 3：启动、探测、停止，失败只记录
    async fn smoke_test(&self) {
        tracing::info!("Running readiness smoke test");
        let scope = match ServerScope::start(
            self.services.launcher.as_ref(),
            self.config.port,
            self.config.stop_grace,
        )
        .await
        {
            Ok(scope) => scope,
            Err(e) => {
                tracing::warn!(error = %e, "Smoke test could not start server");
                return;
            }
        };

        let ready = scope
            .run(
                self.services
                    .prober
                    .wait_until_ready(self.services.server.as_ref(), self.config.smoke_timeout),
            )
            .await;
        if ready {
            tracing::info!("Smoke test passed");
        } else {
            tracing::warn!("Smoke test failed, continuing");
        }
    }

    /// 步骤 5
    async fn collect_host_info(&self) {
        let info = self.services.host_probe.collect().await;
        if let Some(error) = &info.error {
            tracing::warn!(error = %error, "Host info collected with errors");
        } else {
            tracing::info!(gpus = info.gpus.len(), cpu = ?info.cpu, "Host info collected");
        }

        match serde_json::to_value(&info) {
            Ok(value) => {
                if let Err(e) = self.services.state.save_gpu_info(&value).await {
                    tracing::warn!(error = %e, "Failed to write GPU info");
                }
            }
            Err(e) => tracing::warn!(error = %e, "Failed to serialize GPU info"),
        }
    }

    /// 上次运行留下的成功工作流（文件仍存在才采用）
    async fn recover_last_success(&self) -> Option<PathBuf> {
        match self.services.state.load_last_success().await {
            Ok(Some(path)) if path.is_file() => {
                tracing::info!(prompt = %path.display(), "Recovered last successful prompt");
                Some(path)
            }
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable last-success record");
                None
            }
        }
    }

    /// 步骤 7
    async fn run_jobs(&self, state: &mut RunState) -> Result<(), ApplicationError> {
        for index in 0..self.config.max_jobs {
            let resolution =
                self.config
                    .catalog
                    .resolve(index, state.last_success.as_deref(), Path::is_file);

            let (path, fallback) = match resolution {
                PromptResolution::Exact(path) => (path, false),
                PromptResolution::Fallback { missing, substitute } => {
                    tracing::warn!(
                        index,
                        missing = %missing.display(),
                        substitute = %substitute.display(),
                        "Prompt missing, reusing last successful prompt"
                    );
                    state.report.fallbacks += 1;
                    (substitute, true)
                }
                PromptResolution::Skip { missing } => {
                    tracing::warn!(
                        index,
                        missing = %missing.display(),
                        "Prompt missing and no prior success, skipping"
                    );
                    state.report.jobs_skipped += 1;
                    continue;
                }
            };

            let prompt = match load_prompt(&path).await {
                Ok(prompt) => prompt,
                Err(e) => {
                    tracing::error!(index, error = %e, "Cannot load prompt, skipping");
                    state.report.jobs_failed += 1;
                    continue;
                }
            };

            tracing::info!(index, prompt = %path.display(), "Running job");
            state.report.jobs_attempted += 1;
            let result = self.services.job_driver.handle(RunJob { prompt }).await;

            state.report.jobs.push(JobRecord {
                index,
                prompt: result.prompt_name.clone(),
                fallback,
                state: format!("{:?}", result.state),
                images_saved: result.images_saved,
                elapsed_secs: result.elapsed.as_secs_f64(),
            });

            if !result.is_success() {
                tracing::error!(index, state = ?result.state, "Job failed, continuing");
                state.report.jobs_failed += 1;
                continue;
            }

            state.report.jobs_succeeded += 1;
            if let Err(e) = self.services.state.save_last_success(&path).await {
                tracing::warn!(index, error = %e, "Failed to persist last successful prompt");
            }
            state.last_success = Some(path);

            if self.report_result().await {
                state.report.submissions += 1;
            }
        }

        Ok(())
    }

    /// 成功任务之后：生成汇总并上报
    async fn report_result(&self) -> bool {
        if let Some(script) = &self.config.summary_script {
            self.run_script("summary", script).await;
        }

        self.services
            .reporter
            .handle(SubmitResult {
                summary_path: self.config.summary_path.clone(),
            })
            .await
    }

    async fn run_script(&self, purpose: &str, script: &Path) {
        tracing::info!(purpose, script = %script.display(), "Running external script");
        if let Err(e) = self.services.scripts.run(script).await {
            tracing::warn!(purpose, error = %e, "External script failed");
        }
    }

    async fn save_timings(&self, report: &RunReport) {
        let timings = json!({
            "server_startup_secs": report.server_startup_secs,
            "model_download_secs": report.model_download_secs,
            "model_files": report.model_files,
            "jobs": report.jobs,
        });
        if let Err(e) = self.services.state.save_timings(&timings).await {
            tracing::warn!(error = %e, "Failed to write run timings");
        }
    }
}

async fn load_prompt(path: &Path) -> Result<PromptSpec, ApplicationError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ApplicationError::internal(format!("{}: {}", path.display(), e)))?;
    PromptSpec::from_slice(path, &bytes).map_err(|e| ApplicationError::internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::commands::handlers::JobDriverConfig;
    use crate::application::ports::{
        DownloadError, DownloaderPort, HostInfo, ResultSinkPort, ServerHandle, SinkError,
        StateError, StopOutcome,
    };
    use crate::infrastructure::adapters::{FakeComfyClient, FakeComfyClientConfig};
    use crate::infrastructure::persistence::FileRunStateStore;
    use async_trait::async_trait;
    use serde_json::{Map, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::{tempdir, TempDir};

    #[derive(Default)]
    struct Counters {
        starts: AtomicUsize,
        stops: AtomicUsize,
    }

    struct CountingHandle(Arc<Counters>);

    #[async_trait]
    impl ServerHandle for CountingHandle {
        fn pid(&self) -> Option<u32> {
            Some(4242)
        }

        async fn stop(self: Box<Self>, _grace: Duration) -> Result<StopOutcome, ProcessError> {
            self.0.stops.fetch_add(1, Ordering::SeqCst);
            Ok(StopOutcome::Graceful)
        }
    }

    struct CountingLauncher(Arc<Counters>);

    #[async_trait]
    impl ServerLauncherPort for CountingLauncher {
        async fn start(&self, _port: u16) -> Result<Box<dyn ServerHandle>, ProcessError> {
            self.0.starts.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(CountingHandle(self.0.clone())))
        }
    }

    struct StubProvisioner {
        interpreter_ok: bool,
    }

    #[async_trait]
    impl ProvisionerPort for StubProvisioner {
        async fn ensure_source_tree(&self) -> Result<ProvisionOutcome, ProcessError> {
            Ok(ProvisionOutcome::AlreadyPresent)
        }

        async fn install_dependencies(&self) -> Result<(), ProcessError> {
            if self.interpreter_ok {
                Ok(())
            } else {
                Err(ProcessError::IncompatibleInterpreter {
                    found: "3.8.10".to_string(),
                    min: "3.9".to_string(),
                    max: "3.13".to_string(),
                })
            }
        }
    }

    #[derive(Default)]
    struct RecordingScripts {
        runs: Mutex<Vec<PathBuf>>,
    }

    #[async_trait]
    impl ScriptRunnerPort for RecordingScripts {
        async fn run(&self, script: &Path) -> Result<(), ProcessError> {
            self.runs.lock().unwrap().push(script.to_path_buf());
            Ok(())
        }
    }

    struct StubHostProbe;

    #[async_trait]
    impl HostProbePort for StubHostProbe {
        async fn collect(&self) -> HostInfo {
            HostInfo {
                cpu_cores: 8,
                error: Some("nvidia-smi not found".to_string()),
                ..Default::default()
            }
        }
    }

    struct NoDownloads;

    #[async_trait]
    impl DownloaderPort for NoDownloads {
        async fn fetch_text(&self, _url: &str) -> Result<String, DownloadError> {
            Err(DownloadError::NetworkError("offline".to_string()))
        }

        async fn download_to(&self, _url: &str, _dest: &Path) -> Result<u64, DownloadError> {
            Err(DownloadError::NetworkError("offline".to_string()))
        }
    }

    struct OkSink(AtomicUsize);

    #[async_trait]
    impl ResultSinkPort for OkSink {
        async fn post(&self, _row: &Map<String, Value>) -> Result<u16, SinkError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(200)
        }
    }

    /// 保存 last_success 时返回错误，`panics` 为 true 时直接 panic
    struct BrokenState(FileRunStateStore, bool);

    #[async_trait]
    impl RunStatePort for BrokenState {
        async fn load_last_success(&self) -> Result<Option<PathBuf>, StateError> {
            self.0.load_last_success().await
        }

        async fn save_last_success(&self, prompt: &Path) -> Result<(), StateError> {
            if self.1 {
                panic!("state store crashed on {}", prompt.display());
            }
            Err(StateError::Io {
                path: prompt.to_path_buf(),
                message: "disk full".to_string(),
            })
        }

        async fn marker_exists(&self) -> bool {
            self.0.marker_exists().await
        }

        async fn create_marker(&self) -> Result<(), StateError> {
            self.0.create_marker().await
        }

        async fn save_gpu_info(&self, info: &Value) -> Result<(), StateError> {
            self.0.save_gpu_info(info).await
        }

        async fn load_gpu_info(&self) -> Result<Option<Value>, StateError> {
            self.0.load_gpu_info().await
        }

        async fn save_timings(&self, timings: &Value) -> Result<(), StateError> {
            self.0.save_timings(timings).await
        }
    }

    struct Harness {
        temp: TempDir,
        counters: Arc<Counters>,
        server: Arc<FakeComfyClient>,
        scripts: Arc<RecordingScripts>,
        sink: Arc<OkSink>,
    }

    impl Harness {
        fn new(server: FakeComfyClientConfig) -> Self {
            let temp = tempdir().unwrap();
            std::fs::create_dir_all(temp.path().join("workflows")).unwrap();
            Self {
                temp,
                counters: Arc::new(Counters::default()),
                server: Arc::new(FakeComfyClient::new(server)),
                scripts: Arc::new(RecordingScripts::default()),
                sink: Arc::new(OkSink(AtomicUsize::new(0))),
            }
        }

        fn artifacts(&self) -> PathBuf {
            self.temp.path().join("Artifacts")
        }

        fn write_prompt(&self, index: usize, graph: Value) -> PathBuf {
            let path = self
                .temp
                .path()
                .join(format!("workflows/workflow_{}.json", index));
            std::fs::write(&path, serde_json::to_vec(&graph).unwrap()).unwrap();
            path
        }

        fn config(&self) -> RunBenchmarkConfig {
            RunBenchmarkConfig {
                port: 8188,
                stop_grace: Duration::from_millis(50),
                startup_timeout: Duration::from_millis(200),
                smoke_test: false,
                smoke_timeout: Duration::from_millis(100),
                manifest_url: None,
                max_jobs: 3,
                catalog: PromptCatalog::new(
                    self.temp.path().join("workflows"),
                    "workflow_{index}.json",
                ),
                summary_path: self.artifacts().join("benchmark_summary.json"),
                summary_script: None,
                cleanup_script: PathBuf::from("scripts/clean.sh"),
            }
        }

        fn handler(&self, config: RunBenchmarkConfig, state: Arc<dyn RunStatePort>, interpreter_ok: bool) -> RunBenchmarkHandler {
            let server: Arc<dyn GenerationServerPort> = self.server.clone();
            let services = BenchmarkServices {
                provisioner: Arc::new(StubProvisioner { interpreter_ok }),
                launcher: Arc::new(CountingLauncher(self.counters.clone())),
                server: server.clone(),
                prober: ReadinessProber::new(Duration::from_millis(10)),
                fetcher: FetchModelsHandler::new(Arc::new(NoDownloads), self.temp.path()),
                job_driver: RunJobHandler::new(
                    server,
                    JobDriverConfig {
                        poll_interval: Duration::from_millis(5),
                        poll_timeout: Duration::from_millis(200),
                        output_dir: self.artifacts().join("outputs"),
                    },
                ),
                reporter: SubmitResultHandler::new(self.sink.clone(), state.clone(), "1.0"),
                host_probe: Arc::new(StubHostProbe),
                state,
                scripts: self.scripts.clone(),
            };
            RunBenchmarkHandler::new(config, services)
        }

        fn file_state(&self) -> Arc<dyn RunStatePort> {
            Arc::new(FileRunStateStore::new(self.artifacts()))
        }

        fn starts(&self) -> usize {
            self.counters.starts.load(Ordering::SeqCst)
        }

        fn stops(&self) -> usize {
            self.counters.stops.load(Ordering::SeqCst)
        }

        fn script_runs(&self) -> usize {
            self.scripts.runs.lock().unwrap().len()
        }
    }

    #[tokio::test]
    async fn test_missing_prompt_falls_back_to_last_success() {
        let h = Harness::new(FakeComfyClientConfig::default());
        let first = h.write_prompt(0, json!({"id": 0}));
        h.write_prompt(2, json!({"id": 2}));
        let state = h.file_state();
        let handler = h.handler(h.config(), state.clone(), true);

        let report = handler.handle(RunBenchmark { no_delete: false }).await.unwrap();

        let submitted = h.server.submitted();
        assert_eq!(submitted.len(), 3);
        assert_eq!(submitted[1], json!({"prompt": {"id": 0}}));
        assert_eq!(submitted[2], json!({"prompt": {"id": 2}}));
        assert_eq!(report.jobs_succeeded, 3);
        assert_eq!(report.fallbacks, 1);
        assert!(report.jobs[1].fallback);

        // 最后成功的是 2 号
        let last = state.load_last_success().await.unwrap().unwrap();
        assert_eq!(last.file_name(), Some(std::ffi::OsStr::new("workflow_2.json")));
        assert_ne!(last, first);

        assert_eq!((h.starts(), h.stops()), (1, 1));
        assert_eq!(h.script_runs(), 1);
        assert!(h.artifacts().join("gpu_info.json").exists());
        assert!(h.artifacts().join("run_timings.json").exists());
    }

    #[tokio::test]
    async fn test_missing_prompt_skipped_without_prior_success() {
        let h = Harness::new(FakeComfyClientConfig {
            fail_submissions: 1,
            ..Default::default()
        });
        h.write_prompt(0, json!({"id": 0}));
        h.write_prompt(2, json!({"id": 2}));
        let handler = h.handler(h.config(), h.file_state(), true);

        let report = handler.handle(RunBenchmark { no_delete: true }).await.unwrap();

        // 0 号失败，1 号没有回退目标被跳过，2 号正常执行
        assert_eq!(h.server.submitted().len(), 2);
        assert_eq!(report.jobs_failed, 1);
        assert_eq!(report.jobs_skipped, 1);
        assert_eq!(report.jobs_succeeded, 1);
        assert_eq!(report.fallbacks, 0);
        assert_eq!(h.script_runs(), 0);
    }

    #[tokio::test]
    async fn test_readiness_timeout_stops_server_and_fails() {
        let h = Harness::new(FakeComfyClientConfig {
            pings_until_ready: usize::MAX,
            ..Default::default()
        });
        h.write_prompt(0, json!({"id": 0}));
        let handler = h.handler(h.config(), h.file_state(), true);

        let result = handler.handle(RunBenchmark { no_delete: false }).await;

        assert!(matches!(result, Err(ApplicationError::NotReady { .. })));
        assert!(h.server.submitted().is_empty());
        assert_eq!((h.starts(), h.stops()), (1, 1));
        assert_eq!(h.script_runs(), 1);
    }

    #[tokio::test]
    async fn test_unsaved_last_success_does_not_abort_loop() {
        let h = Harness::new(FakeComfyClientConfig::default());
        h.write_prompt(0, json!({"id": 0}));
        h.write_prompt(1, json!({"id": 1}));
        h.write_prompt(2, json!({"id": 2}));
        let state: Arc<dyn RunStatePort> =
            Arc::new(BrokenState(FileRunStateStore::new(h.artifacts()), false));
        let handler = h.handler(h.config(), state, true);

        let report = handler.handle(RunBenchmark { no_delete: true }).await.unwrap();

        assert_eq!(h.server.submitted().len(), 3);
        assert_eq!(report.jobs_succeeded, 3);
        // 内存中的记录仍然更新
        assert_eq!(
            report.last_success.as_deref().and_then(Path::file_name),
            Some(std::ffi::OsStr::new("workflow_2.json"))
        );
        assert_eq!((h.starts(), h.stops()), (1, 1));
    }

    #[tokio::test]
    async fn test_panic_inside_job_loop_still_stops_server() {
        let h = Harness::new(FakeComfyClientConfig::default());
        h.write_prompt(0, json!({"id": 0}));
        h.write_prompt(1, json!({"id": 1}));
        let state: Arc<dyn RunStatePort> =
            Arc::new(BrokenState(FileRunStateStore::new(h.artifacts()), true));
        let handler = h.handler(h.config(), state, true);

        let joined =
            tokio::spawn(async move { handler.handle(RunBenchmark { no_delete: true }).await })
                .await;

        assert!(joined.unwrap_err().is_panic());
        assert_eq!(h.server.submitted().len(), 1);
        assert_eq!((h.starts(), h.stops()), (1, 1));
    }

    #[tokio::test]
    async fn test_smoke_test_uses_its_own_server_scope() {
        let h = Harness::new(FakeComfyClientConfig::default());
        h.write_prompt(0, json!({"id": 0}));
        let mut config = h.config();
        config.smoke_test = true;
        config.max_jobs = 1;
        let handler = h.handler(config, h.file_state(), true);

        handler.handle(RunBenchmark { no_delete: true }).await.unwrap();

        assert_eq!((h.starts(), h.stops()), (2, 2));
    }

    #[tokio::test]
    async fn test_incompatible_interpreter_aborts_before_launch() {
        let h = Harness::new(FakeComfyClientConfig::default());
        let handler = h.handler(h.config(), h.file_state(), false);

        let result = handler.handle(RunBenchmark { no_delete: false }).await;

        assert!(matches!(
            result,
            Err(ApplicationError::UnsupportedEnvironment(_))
        ));
        assert_eq!(h.starts(), 0);
        assert_eq!(h.script_runs(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_manifest_aborts_before_launch() {
        let h = Harness::new(FakeComfyClientConfig::default());
        let mut config = h.config();
        config.manifest_url = Some("https://e.com/basemodels.txt".to_string());
        let handler = h.handler(config, h.file_state(), true);

        let result = handler.handle(RunBenchmark { no_delete: true }).await;

        assert!(matches!(
            result,
            Err(ApplicationError::ManifestUnavailable(_))
        ));
        assert_eq!(h.starts(), 0);
    }

    #[tokio::test]
    async fn test_summary_submitted_once_per_run() {
        let h = Harness::new(FakeComfyClientConfig::default());
        h.write_prompt(0, json!({"id": 0}));
        h.write_prompt(1, json!({"id": 1}));
        std::fs::create_dir_all(h.artifacts()).unwrap();
        std::fs::write(
            h.artifacts().join("benchmark_summary.json"),
            br#"{"elapsed": 12.5}"#,
        )
        .unwrap();
        let handler = h.handler(h.config(), h.file_state(), true);

        let report = handler.handle(RunBenchmark { no_delete: true }).await.unwrap();

        assert_eq!(report.jobs_succeeded, 3);
        assert_eq!(report.submissions, 1);
        assert_eq!(h.sink.0.load(Ordering::SeqCst), 1);
        assert!(h.artifacts().join(".submitted").exists());
    }
}
