//! Common test utilities for E2E testing with mocks.
//!
//! This module provides a test fixture that builds the router in-process
//! with a mock remote service and an immediate poll delay, so ingestion and
//! asset endpoints can be exercised without network access.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use mediaflow_core::testing::{ImmediateDelay, MockRemoteClient};
use mediaflow_core::Config;
use mediaflow_server::{create_router, AppState};

/// Re-export fixtures for test convenience
pub use mediaflow_core::testing::fixtures;

pub const BOUNDARY: &str = "mediaflow-test-boundary";

/// Test fixture for E2E testing with mock dependencies.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_progress_unknown() {
///     let fixture = TestFixture::new();
///
///     let response = fixture.get("/api/progress/nope").await;
///
///     assert_eq!(response.status, 200);
///     assert_eq!(response.body["stage"], "unknown");
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Shared state, for inspecting the tracker and cache
    pub state: Arc<AppState>,
    /// Mock remote service - script states, inject errors
    pub client: Arc<MockRemoteClient>,
    /// Temporary directory for in-flight media
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub text: String,
}

impl TestFixture {
    /// Create a fixture with a configured default API key.
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Create a fixture, adjusting the test config first.
    pub fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut config = fixtures::test_config(temp_dir.path());
        adjust(&mut config);

        let client = Arc::new(MockRemoteClient::new());
        let state = Arc::new(
            AppState::build(config, client.clone(), Arc::new(ImmediateDelay::new()))
                .expect("Failed to build app state"),
        );
        let router = create_router(Arc::clone(&state));

        Self {
            router,
            state,
            client,
            temp_dir,
        }
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None, &[]).await
    }

    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body), &[]).await
    }

    pub async fn patch(&self, path: &str, body: Value) -> TestResponse {
        self.request("PATCH", path, Some(body), &[]).await
    }

    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None, &[]).await
    }

    pub async fn get_with_headers(&self, path: &str, headers: &[(&str, &str)]) -> TestResponse {
        self.request("GET", path, None, headers).await
    }

    pub async fn post_with_headers(
        &self,
        path: &str,
        body: Value,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        self.request("POST", path, Some(body), headers).await
    }

    /// POST a multipart body with a single `file` part.
    pub async fn upload(
        &self,
        path: &str,
        filename: &str,
        content_type: &str,
        data: &[u8],
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let body = multipart_body(filename, content_type, data);
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .header("Content-Length", body.len());
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        self.send(builder.body(Body::from(body)).unwrap()).await
    }

    pub async fn post_raw(&self, path: &str, body: &str, content_type: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", content_type)
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// Poll the progress endpoint until the session is terminal.
    pub async fn wait_for_progress(&self, upload_id: &str) -> TestResponse {
        let path = format!("/api/progress/{}", upload_id);
        for _ in 0..500 {
            let response = self.get(&path).await;
            let stage = response.body["stage"].as_str().unwrap_or_default();
            if stage == "complete" || stage == "error" {
                return response;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("upload {} never finished", upload_id);
    }

    async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);
        for (name, value) in headers {
            request_builder = request_builder.header(*name, *value);
        }

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        self.send(request_builder.body(body).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let text = String::from_utf8_lossy(&body_bytes).into_owned();
        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body, text }
    }
}

/// Build a multipart/form-data body with one file part.
pub fn multipart_body(filename: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
            filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}
