//! Executes `HttpRequest` values against a server.
//!
//! `Transport` is the I/O seam of the crate: the API client only builds and
//! parses plain data, and everything above it talks to the network through
//! this trait. `ReqwestTransport` is the production implementation.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::cancel::CancelToken;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Performs one HTTP round-trip.
///
/// Implementations return every HTTP status as data. Only failures that
/// produce no response at all map to `ApiError::Transport`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError>;
}

/// Execute `request`, giving up with `ApiError::Cancelled` as soon as
/// `cancel` fires. A response arriving after cancellation is dropped.
pub async fn send(
    transport: &dyn Transport,
    request: HttpRequest,
    cancel: &CancelToken,
) -> Result<HttpResponse, ApiError> {
    if cancel.is_cancelled() {
        return Err(ApiError::Cancelled);
    }
    let method = request.method;
    let path = request.path.clone();
    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ApiError::Cancelled),
        result = transport.execute(request) => result,
    };
    match &result {
        Ok(response) => debug!(method = method.as_str(), %path, status = response.status, "request completed"),
        Err(err) => debug!(method = method.as_str(), %path, error = %err, "request failed"),
    }
    result
}

/// `Transport` backed by a shared `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a transport with an overall per-request timeout. `None` keeps
    /// reqwest's default of no timeout.
    pub fn with_timeout(timeout: Option<Duration>) -> Result<Self, ApiError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };
        let mut builder = self.client.request(method, &request.path);
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(key, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (key.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;

    fn request() -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            path: "http://localhost/api/v1/todos".to_string(),
            headers: Vec::new(),
            body: None,
        }
    }

    #[tokio::test]
    async fn send_returns_transport_response() {
        let transport = ScriptedTransport::new();
        transport.push(200, r#"{"todos":[]}"#);
        let response = send(&transport, request(), &CancelToken::new()).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn cancelled_token_skips_the_call() {
        let transport = ScriptedTransport::new();
        transport.push(200, "{}");
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = send(&transport, request(), &cancel).await.unwrap_err();
        assert!(matches!(err, ApiError::Cancelled));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn unreachable_server_is_a_transport_error() {
        let transport = ReqwestTransport::with_timeout(Some(Duration::from_secs(2))).unwrap();
        // Grab a free port, then close it so nothing is listening there.
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let mut req = request();
        req.path = format!("http://{addr}/api/v1/todos");
        let err = transport.execute(req).await.unwrap_err();
        assert!(err.is_transport());
    }
}
