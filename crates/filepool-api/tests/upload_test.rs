//! End-to-end tests for the upload relay: routing, auth, orchestrated
//! fallback, and the public response contract, exercised against the real
//! router with mock storage backends.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use axum::Router;
use filepool_api::setup::routes::setup_routes;
use filepool_api::state::AppState;
use filepool_core::{Config, PoolTopology, ProviderKind};
use filepool_storage::{
    live_payloads, AccountEntry, AccountPool, StagedPayload, StorageBackend, StorageError,
    StorageResult, StorageUsage, StoredObject, Topology, Uploader,
};
use tower::ServiceExt;

const TEST_KEY: &str = "test-secret-key";

// Tests assert on the process-wide staged-payload counter, so they must not
// overlap.
static TEST_LOCK: Mutex<()> = Mutex::new(());

fn lock() -> MutexGuard<'static, ()> {
    TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

enum Behavior {
    Succeed(&'static str),
    Fail(&'static str),
}

struct MockBackend {
    behavior: Behavior,
    calls: AtomicUsize,
}

impl MockBackend {
    fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(MockBackend {
            behavior,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    async fn store(
        &self,
        _payload: &StagedPayload,
        filename: &str,
        _content_type: &str,
    ) -> StorageResult<StoredObject> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Succeed(url) => Ok(StoredObject {
                url: url.to_string(),
                provider_id: format!("id-{filename}"),
            }),
            Behavior::Fail(detail) => Err(StorageError::UploadFailed(detail.to_string())),
        }
    }

    async fn usage(&self) -> StorageResult<Option<StorageUsage>> {
        Ok(Some(StorageUsage {
            used_bytes: 1024,
            limit_bytes: Some(1024 * 1024),
        }))
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::S3
    }
}

fn test_config(max_file_size_bytes: usize) -> Config {
    Config::new(
        4000,
        "development".to_string(),
        vec!["*".to_string()],
        Some(TEST_KEY.to_string()),
        max_file_size_bytes,
        Duration::from_secs(5),
        PoolTopology::Ordered,
        Vec::new(),
    )
}

fn app_with(backends: Vec<Arc<MockBackend>>, max_file_size_bytes: usize) -> Router {
    let entries = backends
        .into_iter()
        .enumerate()
        .map(|(i, backend)| AccountEntry {
            name: format!("Account-{}", i + 1),
            backend,
        })
        .collect();
    let pool = Arc::new(AccountPool::new(entries, Topology::Ordered));

    let config = test_config(max_file_size_bytes);
    let uploader = Uploader::new(pool, config.attempt_timeout());
    let state = Arc::new(AppState::new(config.clone(), uploader));
    setup_routes(&config, state).expect("router setup")
}

const BOUNDARY: &str = "test-boundary-7291";

fn multipart_body(file: Option<(&str, &[u8])>, upload_key: Option<&str>) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some(key) = upload_key {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(b"Content-Disposition: form-data; name=\"uploadKey\"\r\n\r\n");
        body.extend_from_slice(key.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    if let Some((filename, data)) = file {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n")
                .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: text/plain\r\n\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(body: Vec<u8>, header_key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri("/upload").header(
        "content-type",
        format!("multipart/form-data; boundary={BOUNDARY}"),
    );
    if let Some(key) = header_key {
        builder = builder.header("x-upload-key", key);
    }
    builder.body(Body::from(body)).expect("request")
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn test_upload_without_key_is_rejected_before_storage() {
    let _guard = lock();
    let backend = MockBackend::new(Behavior::Succeed("https://example/1"));
    let app = app_with(vec![backend.clone()], 5 * 1024 * 1024);

    let body = multipart_body(Some(("a.txt", b"hello")), None);
    let response = app.oneshot(upload_request(body, None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = json_body(response).await;
    assert_eq!(json["success"], serde_json::json!(false));
    assert_eq!(json["message"], serde_json::json!("Unauthorized"));
    assert_eq!(backend.calls(), 0);
    assert_eq!(live_payloads(), 0);
}

#[tokio::test]
async fn test_upload_with_wrong_header_key_is_rejected() {
    let _guard = lock();
    let backend = MockBackend::new(Behavior::Succeed("https://example/1"));
    let app = app_with(vec![backend.clone()], 5 * 1024 * 1024);

    let body = multipart_body(Some(("a.txt", b"hello")), None);
    let response = app
        .oneshot(upload_request(body, Some("wrong-key")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_upload_falls_back_to_second_account() {
    let _guard = lock();
    let failing = MockBackend::new(Behavior::Fail("quota exceeded"));
    let succeeding = MockBackend::new(Behavior::Succeed("https://example/x"));
    let app = app_with(vec![failing.clone(), succeeding.clone()], 5 * 1024 * 1024);

    let body = multipart_body(Some(("a.txt", b"0123456789")), None);
    let response = app
        .oneshot(upload_request(body, Some(TEST_KEY)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["success"], serde_json::json!(true));
    assert_eq!(json["assetUrl"], serde_json::json!("https://example/x"));
    assert_eq!(json["service"], serde_json::json!("Account-2"));
    assert_eq!(json["filename"], serde_json::json!("a.txt"));
    assert_eq!(json["size"], serde_json::json!(10));

    assert_eq!(failing.calls(), 1);
    assert_eq!(succeeding.calls(), 1);
    assert_eq!(live_payloads(), 0);
}

#[tokio::test]
async fn test_form_key_accepted_when_header_absent() {
    let _guard = lock();
    let backend = MockBackend::new(Behavior::Succeed("https://example/1"));
    let app = app_with(vec![backend.clone()], 5 * 1024 * 1024);

    let body = multipart_body(Some(("a.txt", b"hello")), Some(TEST_KEY));
    let response = app.oneshot(upload_request(body, None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn test_all_accounts_failing_returns_generic_error() {
    let _guard = lock();
    let b1 = MockBackend::new(Behavior::Fail("quota exceeded"));
    let b2 = MockBackend::new(Behavior::Fail("invalid credentials"));
    let app = app_with(vec![b1.clone(), b2.clone()], 5 * 1024 * 1024);

    let body = multipart_body(Some(("a.txt", b"hello")), None);
    let response = app
        .oneshot(upload_request(body, Some(TEST_KEY)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = json_body(response).await;
    assert_eq!(json["success"], serde_json::json!(false));
    assert_eq!(
        json["message"],
        serde_json::json!("Upload failed on all accounts.")
    );
    // Per-account detail stays server-side.
    let raw = json.to_string();
    assert!(!raw.contains("quota exceeded"));
    assert!(!raw.contains("invalid credentials"));

    assert_eq!(b1.calls(), 1);
    assert_eq!(b2.calls(), 1);
    assert_eq!(live_payloads(), 0);
}

#[tokio::test]
async fn test_empty_pool_returns_generic_error() {
    let _guard = lock();
    let app = app_with(vec![], 5 * 1024 * 1024);

    let body = multipart_body(Some(("a.txt", b"hello")), None);
    let response = app
        .oneshot(upload_request(body, Some(TEST_KEY)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = json_body(response).await;
    assert_eq!(
        json["message"],
        serde_json::json!("Upload failed on all accounts.")
    );
}

#[tokio::test]
async fn test_missing_file_is_rejected() {
    let _guard = lock();
    let backend = MockBackend::new(Behavior::Succeed("https://example/1"));
    let app = app_with(vec![backend.clone()], 5 * 1024 * 1024);

    let body = multipart_body(None, Some(TEST_KEY));
    let response = app.oneshot(upload_request(body, None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["message"], serde_json::json!("No file uploaded."));
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_oversized_file_is_rejected() {
    let _guard = lock();
    let backend = MockBackend::new(Behavior::Succeed("https://example/1"));
    let app = app_with(vec![backend.clone()], 1024 * 1024);

    let big = vec![0u8; 1024 * 1024 + 1];
    let body = multipart_body(Some(("big.bin", &big)), None);
    let response = app
        .oneshot(upload_request(body, Some(TEST_KEY)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(
        json["message"],
        serde_json::json!("File too large. Maximum allowed size is 1 MB.")
    );
    assert_eq!(backend.calls(), 0);
    assert_eq!(live_payloads(), 0);
}

#[tokio::test]
async fn test_empty_file_is_relayed() {
    let _guard = lock();
    let backend = MockBackend::new(Behavior::Succeed("https://example/empty"));
    let app = app_with(vec![backend.clone()], 5 * 1024 * 1024);

    let body = multipart_body(Some(("empty.txt", b"")), None);
    let response = app
        .oneshot(upload_request(body, Some(TEST_KEY)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["success"], serde_json::json!(true));
    assert_eq!(json["size"], serde_json::json!(0));
    assert_eq!(backend.calls(), 1);
    assert_eq!(live_payloads(), 0);
}

#[tokio::test]
async fn test_concurrent_uploads_release_every_staged_payload() {
    let _guard = lock();
    let ok_app = app_with(
        vec![MockBackend::new(Behavior::Succeed("https://example/c"))],
        5 * 1024 * 1024,
    );
    let fail_app = app_with(
        vec![MockBackend::new(Behavior::Fail("disk full"))],
        5 * 1024 * 1024,
    );

    let requests = (0..16).map(|i| {
        let app = if i % 2 == 0 {
            ok_app.clone()
        } else {
            fail_app.clone()
        };
        let body = multipart_body(Some(("c.txt", b"payload-bytes")), None);
        async move {
            (
                i,
                app.oneshot(upload_request(body, Some(TEST_KEY)))
                    .await
                    .unwrap(),
            )
        }
    });

    for (i, response) in futures::future::join_all(requests).await {
        let expected = if i % 2 == 0 {
            StatusCode::OK
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        assert_eq!(response.status(), expected, "request {i}");
    }

    assert_eq!(live_payloads(), 0);
}

#[tokio::test]
async fn test_rate_limit_buckets_key_on_peer_address() {
    let _guard = lock();
    let app = app_with(
        vec![MockBackend::new(Behavior::Succeed("https://example/1"))],
        5 * 1024 * 1024,
    );

    let health = |addr: SocketAddr| {
        Request::builder()
            .method("GET")
            .uri("/health")
            .extension(ConnectInfo(addr))
            .body(Body::empty())
            .unwrap()
    };

    let first = SocketAddr::from(([203, 0, 113, 1], 40000));
    let second = SocketAddr::from(([203, 0, 113, 2], 40000));

    // Default limit is 20 requests per minute per client.
    for _ in 0..20 {
        let response = app.clone().oneshot(health(first)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    let response = app.clone().oneshot(health(first)).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    // A different peer gets its own bucket.
    let response = app.clone().oneshot(health(second)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_status_reports_pool_and_usage() {
    let _guard = lock();
    let backend = MockBackend::new(Behavior::Succeed("https://example/1"));
    let app = app_with(vec![backend.clone()], 5 * 1024 * 1024);

    let request = Request::builder()
        .method("GET")
        .uri("/status")
        .header("x-upload-key", TEST_KEY)
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["accountsActive"], serde_json::json!(1));
    assert_eq!(json["nextAccount"], serde_json::json!("Account-1"));
    assert_eq!(json["accounts"][0]["name"], serde_json::json!("Account-1"));
    assert_eq!(json["accounts"][0]["kind"], serde_json::json!("s3"));
    assert_eq!(
        json["accounts"][0]["usage"]["usedBytes"],
        serde_json::json!(1024)
    );
}

#[tokio::test]
async fn test_status_requires_key() {
    let _guard = lock();
    let app = app_with(
        vec![MockBackend::new(Behavior::Succeed("https://example/1"))],
        5 * 1024 * 1024,
    );

    let request = Request::builder()
        .method("GET")
        .uri("/status")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health_is_public() {
    let _guard = lock();
    let app = app_with(
        vec![MockBackend::new(Behavior::Succeed("https://example/1"))],
        5 * 1024 * 1024,
    );

    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], serde_json::json!("healthy"));
    assert_eq!(json["accountsConfigured"], serde_json::json!(1));
}
