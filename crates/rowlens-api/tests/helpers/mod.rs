//! Shared test harness: an app wired to an in-memory database and a
//! temporary upload directory, plus multipart and SSE helpers.
#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use rowlens_api::setup::routes::build_router;
use rowlens_api::state::AppState;
use rowlens_core::Config;
use rowlens_db::FileRepository;
use rowlens_storage::LocalStorage;
use sqlx::sqlite::SqlitePoolOptions;
use tower::ServiceExt;

pub struct TestApp {
    pub router: Router,
    _tmp: tempfile::TempDir,
}

pub async fn setup_test_app() -> TestApp {
    let tmp = tempfile::tempdir().unwrap();
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    rowlens_db::init_schema(&pool).await.unwrap();

    let upload_dir = tmp.path().join("uploads");
    let storage = LocalStorage::new(&upload_dir).await.unwrap();
    let config = Config {
        upload_folder: upload_dir,
        ..Config::default()
    };

    let state = Arc::new(AppState {
        config,
        files: FileRepository::new(pool),
        storage: Arc::new(storage),
    });

    TestApp {
        router: build_router(state).unwrap(),
        _tmp: tmp,
    }
}

pub const BOUNDARY: &str = "rowlens-test-boundary";

/// Build a multipart POST with a single `file` field.
pub fn multipart_request(uri: &str, filename: &str, content: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
            filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: text/csv\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

pub async fn send(router: &Router, request: Request<Body>) -> Response {
    router.clone().oneshot(request).await.unwrap()
}

pub async fn get(router: &Router, uri: &str) -> Response {
    send(
        router,
        Request::builder().uri(uri).body(Body::empty()).unwrap(),
    )
    .await
}

pub async fn delete(router: &Router, uri: &str) -> Response {
    send(
        router,
        Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

pub async fn body_bytes(response: Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = body_bytes(response).await;
    serde_json::from_slice(&bytes).unwrap()
}

/// Split a full SSE body into its JSON payloads.
pub fn parse_sse_frames(raw: &[u8]) -> Vec<serde_json::Value> {
    let text = std::str::from_utf8(raw).expect("SSE body must be UTF-8");
    text.split("\n\n")
        .filter(|chunk| !chunk.trim().is_empty())
        .map(|chunk| {
            let data = chunk
                .trim_start()
                .strip_prefix("data: ")
                .expect("SSE frame must start with 'data: '");
            serde_json::from_str(data).expect("SSE payload must be JSON")
        })
        .collect()
}

/// Assert that `progress` never decreases within a status segment.
pub fn assert_progress_monotonic_per_status(frames: &[serde_json::Value]) {
    use std::collections::HashMap;
    let mut last: HashMap<String, f64> = HashMap::new();
    for frame in frames {
        let status = frame["status"].as_str().unwrap().to_string();
        let progress = frame["progress"].as_f64().unwrap();
        if let Some(prev) = last.get(&status) {
            assert!(
                progress >= *prev,
                "progress regressed within status {}: {} -> {}",
                status,
                prev,
                progress
            );
        }
        last.insert(status, progress);
    }
}
