//! Canned-response transport for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};
use crate::transport::Transport;

/// Replays queued responses in order and records every request it sees.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<HttpResponse, String>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, status: u16, body: &str) {
        self.responses.lock().unwrap().push_back(Ok(HttpResponse {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }));
    }

    pub fn push_unreachable(&self) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err("connection refused".to_string()));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.requests.lock().unwrap().push(request);
        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(reason)) => Err(ApiError::Transport(reason)),
            None => panic!("ScriptedTransport ran out of responses"),
        }
    }
}

/// `ScriptedTransport` that holds each response back until released. The
/// request is recorded (the server has acted on it) before the hold starts.
pub struct GatedTransport {
    pub inner: ScriptedTransport,
    gate: Semaphore,
}

impl GatedTransport {
    pub fn new() -> Self {
        Self {
            inner: ScriptedTransport::new(),
            gate: Semaphore::new(0),
        }
    }

    /// Yield until `count` requests have reached the server.
    pub async fn wait_for_requests(&self, count: usize) {
        while self.inner.requests().len() < count {
            tokio::task::yield_now().await;
        }
    }

    /// Let one held response through.
    pub fn release(&self) {
        self.gate.add_permits(1);
    }
}

#[async_trait]
impl Transport for GatedTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let response = self.inner.execute(request).await;
        self.gate.acquire().await.unwrap().forget();
        response
    }
}

pub const USER_JSON: &str = r#"{"id":1,"email":"ada@example.com","name":"Ada"}"#;

pub fn todo_json(id: u64, title: &str) -> String {
    format!(
        r#"{{"id":{id},"title":"{title}","description":"","completed":false,"user_id":1,"created_at":"2024-05-01T10:00:00Z","updated_at":"2024-05-01T10:00:00Z"}}"#
    )
}
