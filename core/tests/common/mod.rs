//! Runs the mock server's router in-process as a `Transport`.

use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::Request;
use axum::Router;
use http_body_util::BodyExt;
use todo_core::storage::MemoryTokenStore;
use todo_core::{ApiClient, ApiError, HttpRequest, HttpResponse, TodoApp, TokenStore, Transport};
use tower::ServiceExt;
use tracing_subscriber::EnvFilter;

pub const BASE_URL: &str = "http://mock.test";

/// Sends every request straight into an axum `Router` via `oneshot`.
pub struct RouterTransport {
    router: Router,
    calls: AtomicUsize,
}

impl RouterTransport {
    pub fn new(router: Router) -> Self {
        Self {
            router,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of requests executed so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for RouterTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let uri = request
            .path
            .strip_prefix(BASE_URL)
            .unwrap_or(&request.path)
            .to_string();

        let mut builder = Request::builder().method(request.method.as_str()).uri(uri);
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        let http_request = builder
            .body(request.body.unwrap_or_default())
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let response = self
            .router
            .clone()
            .oneshot(http_request)
            .await
            .unwrap_or_else(|never: Infallible| match never {});

        let status = response.status().as_u16();
        let bytes = response
            .into_body()
            .collect()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?
            .to_bytes();

        Ok(HttpResponse {
            status,
            headers: Vec::new(),
            body: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }
}

/// Route core logs to the test output, filtered by `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A client wired to `router`, with its transport and token store exposed.
pub struct Harness {
    pub app: TodoApp,
    pub transport: Arc<RouterTransport>,
    pub storage: Arc<MemoryTokenStore>,
}

impl Harness {
    pub fn new(router: Router) -> Self {
        Self::with_storage(router, MemoryTokenStore::new())
    }

    pub fn with_storage(router: Router, storage: MemoryTokenStore) -> Self {
        init_tracing();
        let transport = Arc::new(RouterTransport::new(router));
        let storage = Arc::new(storage);
        let app = TodoApp::new(ApiClient::new(BASE_URL), transport.clone(), storage.clone());
        Self {
            app,
            transport,
            storage,
        }
    }

    pub fn stored_token(&self) -> Option<String> {
        self.storage.load().unwrap()
    }
}
