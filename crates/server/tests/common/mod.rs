//! Common test utilities for E2E testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with mock collaborators injected, enabling API tests without node
//! scripts, yt-dlp or network access.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use ripline_core::testing::{MockLauncher, MockLinkConverter, MockRefresher, MockTargetDiscovery};
use ripline_core::{
    orchestrator::SystemResources, Config, EventSink, LinkQueue, ManifestStore, Orchestrator,
    OrchestratorConfig, PathsConfig, StageConfig, StageSequencer,
};

/// Re-export fixtures for test convenience
pub use ripline_core::testing::fixtures;

/// Test fixture for API testing with mock dependencies.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_queue_link() {
///     let fixture = TestFixture::new().await;
///     let response = fixture.post("/api/v1/queue", json!({"url": "https://a"})).await;
///     assert_eq!(response.status, 201);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    pub converter: MockLinkConverter,
    pub discovery: MockTargetDiscovery,
    pub launcher: MockLauncher,
    pub refresher: MockRefresher,
    pub store: ManifestStore,
    pub orchestrator: Arc<Orchestrator>,
    /// Temporary directory holding manifests and music output
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
    /// Create a new test fixture whose links resolve and acquire successfully.
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let data_dir = temp_dir.path().join("data");
        let music_dir = temp_dir.path().join("music");

        let config = Config {
            paths: PathsConfig {
                data_dir: data_dir.clone(),
                music_dir: music_dir.clone(),
                cookies_path: None,
            },
            orchestrator: OrchestratorConfig {
                concurrency: Some(2),
                ..Default::default()
            },
            ..Default::default()
        };

        let converter = MockLinkConverter::new();
        let discovery = MockTargetDiscovery::new();
        let launcher = MockLauncher::new();
        let refresher = MockRefresher::new();

        converter
            .set_query(Some(fixtures::album_query("Boards of Canada", "Geogaddi")))
            .await;
        converter
            .set_manifest_patch(json!({"tracklist": [{"title": "Music Is Math", "number": 1}]}))
            .await;
        discovery
            .set_result(Some(
                "https://www.youtube.com/playlist?list=OLAK_geogaddi".to_string(),
            ))
            .await;

        let store = ManifestStore::new(&data_dir);
        let events = EventSink::new(256);
        let sequencer = StageSequencer::new(
            StageConfig {
                manifest_settle_ms: 0,
                ..Default::default()
            },
            store.clone(),
            &music_dir,
            Arc::new(converter.clone()),
            Arc::new(discovery.clone()),
            Arc::new(launcher.clone()),
            events.clone(),
        );
        let orchestrator = Arc::new(Orchestrator::with_resources(
            config.orchestrator.clone(),
            Arc::new(LinkQueue::new()),
            Arc::new(sequencer),
            events,
            SystemResources::new(4, 8.0),
        ));

        let state = Arc::new(ripline_server::state::AppState::new(
            config,
            Arc::clone(&orchestrator),
            store.clone(),
            Arc::new(refresher.clone()),
        ));
        let router = ripline_server::api::create_router(state);

        Self {
            router,
            converter,
            discovery,
            launcher,
            refresher,
            store,
            orchestrator,
            temp_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// Wait until the background batch has finished.
    pub async fn wait_for_idle(&self) {
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while self.orchestrator.is_running() {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("batch did not finish");
    }

    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

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

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status, $response.status, $response.text
        );
    };
}
