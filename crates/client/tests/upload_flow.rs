//! End-to-end upload tests against an in-process app server and object store.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Multipart, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use uplink_client::HttpTransport;
use uplink_core::upload::{
    AntiForgery, FormFields, Payload, Progress, SessionState, UploadError, UploadObserver,
    UploadOutcome, UploadPipeline, UploadSession, ValidationError,
};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scenario {
    Normal,
    MissingFields,
    StoreForbidden,
    StoreHangs,
}

#[derive(Debug, Clone)]
struct StoredPart {
    name: String,
    filename: Option<String>,
    content_type: Option<String>,
    len: usize,
}

struct Server {
    scenario: Scenario,
    addr: SocketAddr,
    requests: Mutex<Vec<String>>,
    authorize_body: Mutex<Option<String>>,
    parts: Mutex<Vec<StoredPart>>,
    completion_body: Mutex<Option<String>>,
    store_entered: Notify,
}

impl Server {
    fn log(&self, entry: &str) {
        self.requests.lock().unwrap().push(entry.to_string());
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn endpoint(&self) -> Url {
        Url::parse(&format!("http://{}/api/upload", self.addr)).unwrap()
    }

    fn anti_forgery(&self) -> AntiForgery {
        let page = Url::parse(&format!("http://{}/steps/3", self.addr)).unwrap();
        AntiForgery::new("tok", &page)
    }
}

fn has_token(headers: &HeaderMap) -> bool {
    headers.get("x-csrf-token").and_then(|v| v.to_str().ok()) == Some("tok")
}

async fn authorize(State(server): State<Arc<Server>>, headers: HeaderMap, body: String) -> Response {
    server.log("POST /api/upload");
    if !has_token(&headers) {
        return StatusCode::FORBIDDEN.into_response();
    }
    *server.authorize_body.lock().unwrap() = Some(body);

    let url = format!("http://{}/store", server.addr);
    let response = if server.scenario == Scenario::MissingFields {
        json!({ "post": { "url": url }, "file": { "id": "7" } })
    } else {
        json!({
            "post": { "url": url, "fields": { "key": "uploads/7", "policy": "p" } },
            "file": { "id": "7" }
        })
    };
    Json(response).into_response()
}

async fn complete(State(server): State<Arc<Server>>, headers: HeaderMap, body: String) -> StatusCode {
    server.log("PATCH /api/upload");
    if !has_token(&headers) {
        return StatusCode::FORBIDDEN;
    }
    *server.completion_body.lock().unwrap() = Some(body);
    StatusCode::OK
}

async fn store(State(server): State<Arc<Server>>, headers: HeaderMap, mut multipart: Multipart) -> StatusCode {
    server.log("POST /store");
    assert!(headers.get("x-csrf-token").is_none(), "token leaked to the store");

    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let len = field.bytes().await.unwrap().len();
        server.parts.lock().unwrap().push(StoredPart {
            name,
            filename,
            content_type,
            len,
        });
    }

    match server.scenario {
        Scenario::StoreForbidden => StatusCode::FORBIDDEN,
        Scenario::StoreHangs => {
            server.store_entered.notify_one();
            std::future::pending::<StatusCode>().await
        }
        Scenario::Normal | Scenario::MissingFields => StatusCode::NO_CONTENT,
    }
}

async fn start(scenario: Scenario) -> Arc<Server> {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let server = Arc::new(Server {
        scenario,
        addr: listener.local_addr().unwrap(),
        requests: Mutex::new(Vec::new()),
        authorize_body: Mutex::new(None),
        parts: Mutex::new(Vec::new()),
        completion_body: Mutex::new(None),
        store_entered: Notify::new(),
    });

    let app = Router::new()
        .route("/api/upload", post(authorize).patch(complete))
        .route("/store", post(store))
        .with_state(Arc::clone(&server));
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    server
}

#[derive(Default)]
struct Recorder {
    progress: Mutex<Vec<Progress>>,
    completed: AtomicUsize,
    errors: Mutex<Vec<UploadError>>,
}

impl UploadObserver for Recorder {
    fn on_progress(&self, progress: Progress) {
        self.progress.lock().unwrap().push(progress);
    }

    fn on_complete(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    fn on_error(&self, error: &UploadError) {
        self.errors.lock().unwrap().push(error.clone());
    }
}

fn pipeline(server: &Server, chunk_size: usize) -> Arc<UploadPipeline<HttpTransport>> {
    let transport = HttpTransport::new(reqwest::Client::new()).with_chunk_size(chunk_size);
    Arc::new(UploadPipeline::new(Arc::new(transport), server.anti_forgery()))
}

fn report_session(server: &Server) -> UploadSession {
    UploadSession::builder(server.endpoint())
        .payload(Payload::new("report.pdf", "application/pdf", vec![0x25u8; 2048]))
        .field("step", "3")
        .build()
        .unwrap()
}

async fn run(server: &Server, chunk_size: usize) -> (UploadSession, UploadOutcome, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let task = pipeline(server, chunk_size)
        .spawn(report_session(server), Arc::clone(&recorder) as Arc<dyn UploadObserver>)
        .unwrap();
    let (session, outcome) = tokio::time::timeout(Duration::from_secs(10), task.join())
        .await
        .unwrap()
        .unwrap();
    (session, outcome, recorder)
}

#[tokio::test]
async fn test_upload_happy_path() {
    let server = start(Scenario::Normal).await;
    let (session, outcome, recorder) = run(&server, 64 * 1024).await;

    assert_eq!(outcome, UploadOutcome::Completed);
    assert_eq!(session.state(), SessionState::Completed);
    assert_eq!(recorder.completed.load(Ordering::SeqCst), 1);
    assert!(recorder.errors.lock().unwrap().is_empty());
    assert_eq!(
        server.requests(),
        vec!["POST /api/upload", "POST /store", "PATCH /api/upload"]
    );

    let authorize_body = server.authorize_body.lock().unwrap().clone().unwrap();
    assert_eq!(
        FormFields::parse_urlencoded(&authorize_body).to_urlencoded(),
        "step=3&content_type=application%2Fpdf"
    );

    let parts = server.parts.lock().unwrap().clone();
    let names: Vec<&str> = parts.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["key", "policy", "file"]);
    let file = &parts[2];
    assert_eq!(file.filename.as_deref(), Some("report.pdf"));
    assert_eq!(file.content_type.as_deref(), Some("application/pdf"));
    assert_eq!(file.len, 2048);

    assert_eq!(
        server.completion_body.lock().unwrap().as_deref(),
        Some("id=7&filesize=2048&media_type=application%2Fpdf")
    );
}

#[tokio::test]
async fn test_progress_reported_per_chunk() {
    let server = start(Scenario::Normal).await;
    let (_, outcome, recorder) = run(&server, 256).await;

    assert!(outcome.is_completed());
    let progress = recorder.progress.lock().unwrap().clone();
    let sent: Vec<u64> = progress.iter().map(|p| p.bytes_sent).collect();
    assert_eq!(sent, (1..=8).map(|i| i * 256).collect::<Vec<u64>>());
    assert!(progress.iter().all(|p| p.bytes_total == 2048));
}

#[tokio::test]
async fn test_store_forbidden() {
    let server = start(Scenario::StoreForbidden).await;
    let (session, outcome, recorder) = run(&server, 64 * 1024).await;

    let UploadOutcome::Failed(err) = outcome else {
        panic!("expected failure");
    };
    assert!(matches!(err, UploadError::Transfer { status: Some(403), .. }));
    assert_eq!(session.state(), SessionState::Failed);
    assert_eq!(recorder.errors.lock().unwrap().len(), 1);
    assert_eq!(recorder.completed.load(Ordering::SeqCst), 0);
    assert_eq!(server.requests(), vec!["POST /api/upload", "POST /store"]);
}

#[tokio::test]
async fn test_malformed_authorization_skips_store() {
    let server = start(Scenario::MissingFields).await;
    let (session, outcome, recorder) = run(&server, 64 * 1024).await;

    assert!(matches!(
        outcome,
        UploadOutcome::Failed(UploadError::Protocol(_))
    ));
    assert_eq!(session.state(), SessionState::Failed);
    assert_eq!(recorder.errors.lock().unwrap().len(), 1);
    assert_eq!(server.requests(), vec!["POST /api/upload"]);
}

#[tokio::test]
async fn test_abort_in_flight_transfer() {
    let server = start(Scenario::StoreHangs).await;
    let recorder = Arc::new(Recorder::default());
    let task = pipeline(&server, 512)
        .spawn(report_session(&server), Arc::clone(&recorder) as Arc<dyn UploadObserver>)
        .unwrap();

    tokio::time::timeout(Duration::from_secs(10), server.store_entered.notified())
        .await
        .unwrap();
    assert!(task.abort());

    let (session, outcome) = tokio::time::timeout(Duration::from_secs(10), task.join())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(outcome, UploadOutcome::Aborted);
    assert_eq!(session.state(), SessionState::Aborted);
    assert_eq!(recorder.completed.load(Ordering::SeqCst), 0);
    assert!(recorder.errors.lock().unwrap().is_empty());
    assert!(!server.requests().contains(&"PATCH /api/upload".to_string()));
}

#[tokio::test]
async fn test_malformed_content_type_never_reaches_server() {
    let server = start(Scenario::Normal).await;
    let session = UploadSession::builder(server.endpoint())
        .payload(Payload::new("report.pdf", "pdf", vec![0x25u8; 2048]))
        .build()
        .unwrap();

    let err = pipeline(&server, 512)
        .spawn(session, Arc::new(uplink_core::upload::NoopObserver))
        .err()
        .unwrap();

    assert!(matches!(err, ValidationError::InvalidContentType { .. }));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn test_wrong_token_is_rejected_by_server() {
    let server = start(Scenario::Normal).await;
    let page = Url::parse(&format!("http://{}/steps/3", server.addr)).unwrap();
    let transport = HttpTransport::new(reqwest::Client::new());
    let pipeline = UploadPipeline::new(Arc::new(transport), AntiForgery::new("wrong", &page));
    let mut session = report_session(&server);

    let outcome = pipeline
        .run(&mut session, Arc::new(uplink_core::upload::NoopObserver))
        .await
        .unwrap();

    let err = outcome.into_result().unwrap_err();
    assert_eq!(err.status(), Some(403));
    assert_eq!(err.category(), "transport");
}
