//! HTTP 适配器集成测试
//!
//! 用 axum 在回环地址的随机端口上启动一个假的 ComfyUI / 下载源 / 上报端。

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::tempdir;

use aicubench::application::ports::{GenerationServerPort, ResultSinkPort};
use aicubench::application::{
    FetchModels, FetchModelsHandler, JobDriverConfig, ReadinessProber, RunJob, RunJobHandler,
};
use aicubench::domain::{JobState, PromptSpec};
use aicubench::infrastructure::adapters::{
    HttpComfyClient, HttpComfyClientConfig, HttpDownloader, HttpDownloaderConfig, HttpResultSink,
    HttpResultSinkConfig,
};

#[derive(Default)]
struct FakeServer {
    prompts: Mutex<Vec<Value>>,
    history_calls: AtomicUsize,
    rows: Mutex<Vec<Value>>,
    base: Mutex<String>,
}

type Shared = Arc<FakeServer>;

async fn root() -> &'static str {
    "ComfyUI"
}

async fn submit(State(s): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    s.prompts.lock().unwrap().push(body);
    Json(json!({"prompt_id": "job-1", "number": 0}))
}

async fn history(State(s): State<Shared>, Path(id): Path<String>) -> Json<Value> {
    // 第一次轮询还在运行
    if s.history_calls.fetch_add(1, Ordering::SeqCst) == 0 {
        return Json(json!({}));
    }
    Json(json!({
        (id): {"outputs": {"9": {"images": [
            {"filename": "a.png", "subfolder": "", "type": "output"},
            {"filename": "b.png", "subfolder": "", "type": "output"}
        ]}}}
    }))
}

async fn view(Query(q): Query<HashMap<String, String>>) -> impl IntoResponse {
    match q.get("filename").map(String::as_str) {
        Some("a.png") if q.get("type").map(String::as_str) == Some("output") => {
            (StatusCode::OK, b"PNG-A".to_vec())
        }
        _ => (StatusCode::NOT_FOUND, Vec::new()),
    }
}

async fn manifest(State(s): State<Shared>) -> String {
    let base = s.base.lock().unwrap().clone();
    format!(
        "# recommended\n\
         wget -c {base}/files/model.bin -P ./models/checkpoints\n\
         wget -c {base}/files/gone.bin -P ./models/vae\n\
         wget {base}/files/model.bin\n"
    )
}

async fn model_file() -> Vec<u8> {
    vec![7u8; 4096]
}

async fn sink(State(s): State<Shared>, Json(row): Json<Value>) -> impl IntoResponse {
    s.rows.lock().unwrap().push(row);
    (StatusCode::FOUND, [(header::LOCATION, "/sink/done")])
}

async fn sink_done() -> &'static str {
    "ok"
}

async fn spawn_fake() -> (SocketAddr, Shared) {
    let state: Shared = Arc::new(FakeServer::default());
    let app = Router::new()
        .route("/", get(root))
        .route("/prompt", post(submit))
        .route("/history/:id", get(history))
        .route("/view", get(view))
        .route("/basemodels.txt", get(manifest))
        .route("/files/model.bin", get(model_file))
        .route("/sink", post(sink))
        .route("/sink/done", get(sink_done))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    *state.base.lock().unwrap() = format!("http://{}", addr);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

fn comfy_client(addr: SocketAddr) -> Arc<HttpComfyClient> {
    Arc::new(
        HttpComfyClient::new(HttpComfyClientConfig::new(format!("http://{}", addr)).with_timeout(5))
            .unwrap(),
    )
}

#[tokio::test]
async fn test_job_runs_against_http_server() {
    let (addr, fake) = spawn_fake().await;
    let temp = tempdir().unwrap();
    let driver = RunJobHandler::new(
        comfy_client(addr),
        JobDriverConfig {
            poll_interval: Duration::from_millis(20),
            poll_timeout: Duration::from_secs(3),
            output_dir: temp.path().join("outputs"),
        },
    );

    let graph = json!({"3": {"class_type": "KSampler", "inputs": {"seed": 42}}});
    let result = driver
        .handle(RunJob {
            prompt: PromptSpec::new("workflows/workflow_0.json", graph.clone()),
        })
        .await;

    assert_eq!(result.state, JobState::Completed);
    assert_eq!(result.job_id.as_ref().map(|id| id.as_str()), Some("job-1"));
    assert_eq!(result.images_saved, 1);
    assert_eq!(
        std::fs::read(temp.path().join("outputs/a.png")).unwrap(),
        b"PNG-A"
    );
    assert!(!temp.path().join("outputs/b.png").exists());
    assert_eq!(fake.prompts.lock().unwrap()[0], json!({"prompt": graph}));
    assert!(fake.history_calls.load(Ordering::SeqCst) >= 2);
}

#[tokio::test]
async fn test_readiness_against_live_and_closed_ports() {
    let (addr, _fake) = spawn_fake().await;
    let prober = ReadinessProber::new(Duration::from_millis(50));

    let live = comfy_client(addr);
    assert_eq!(live.ping().await.unwrap(), 200);
    assert!(prober.wait_until_ready(live.as_ref(), Duration::from_secs(1)).await);

    // 先占用再释放，得到一个没人监听的端口
    let closed = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let dead = comfy_client(closed);
    let timeout = Duration::from_millis(300);
    let started = Instant::now();
    assert!(!prober.wait_until_ready(dead.as_ref(), timeout).await);
    assert!(started.elapsed() < timeout + Duration::from_millis(500));
}

#[tokio::test]
async fn test_models_downloaded_from_manifest() {
    let (addr, _fake) = spawn_fake().await;
    let temp = tempdir().unwrap();
    let install = temp.path().join("ComfyUI");
    let downloader = Arc::new(HttpDownloader::new(HttpDownloaderConfig::default()).unwrap());
    let handler = FetchModelsHandler::new(downloader, &install);

    let report = handler
        .handle(FetchModels {
            manifest_url: format!("http://{}/basemodels.txt", addr),
        })
        .await
        .unwrap();

    assert_eq!(report.directives, 3);
    assert_eq!(report.downloaded, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.malformed, 1);
    assert_eq!(report.total_bytes(), 4096);

    let model = install.join("models/checkpoints/model.bin");
    assert_eq!(std::fs::metadata(&model).unwrap().len(), 4096);
    assert!(!install.join("models/vae/gone.bin").exists());
}

#[tokio::test]
async fn test_complete_model_is_not_downloaded_again() {
    let (addr, _fake) = spawn_fake().await;
    let temp = tempdir().unwrap();
    let install = temp.path().join("ComfyUI");
    let model = install.join("models/checkpoints/model.bin");
    std::fs::create_dir_all(model.parent().unwrap()).unwrap();
    std::fs::write(&model, vec![0u8; 4096]).unwrap();
    let downloader = Arc::new(HttpDownloader::new(HttpDownloaderConfig::default()).unwrap());
    let handler = FetchModelsHandler::new(downloader, &install);

    let report = handler
        .handle(FetchModels {
            manifest_url: format!("http://{}/basemodels.txt", addr),
        })
        .await
        .unwrap();

    assert_eq!(report.downloaded, 1);
    assert_eq!(report.total_bytes(), 4096);
    // 内容未被服务端的数据覆盖
    assert!(std::fs::read(&model).unwrap().iter().all(|b| *b == 0));
}

#[tokio::test]
async fn test_unreachable_manifest_is_error() {
    let (addr, _fake) = spawn_fake().await;
    let temp = tempdir().unwrap();
    let downloader = Arc::new(HttpDownloader::new(HttpDownloaderConfig::default()).unwrap());
    let handler = FetchModelsHandler::new(downloader, temp.path());

    let result = handler
        .handle(FetchModels {
            manifest_url: format!("http://{}/missing.txt", addr),
        })
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_result_sink_follows_redirect() {
    let (addr, fake) = spawn_fake().await;
    let sink = HttpResultSink::new(HttpResultSinkConfig {
        endpoint: format!("http://{}/sink", addr),
        timeout_secs: 5,
    })
    .unwrap();

    let mut row = Map::new();
    row.insert("timings.startup".to_string(), json!(1.5));
    row.insert("schema_version".to_string(), json!("1.0"));

    assert_eq!(sink.post(&row).await.unwrap(), 200);
    assert_eq!(
        fake.rows.lock().unwrap()[0],
        json!({"timings.startup": 1.5, "schema_version": "1.0"})
    );
}
