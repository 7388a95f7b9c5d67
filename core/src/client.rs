//! Stateless HTTP request builder and response parser for the todo API.
//!
//! # Design
//! `ApiClient` holds only a `base_url` and carries no mutable state between
//! calls. Each endpoint is split into a `build_*` method that produces an
//! `HttpRequest` and a `parse_*` method that consumes an `HttpResponse`.
//! A `Transport` executes the round-trip in between, keeping this module
//! deterministic and free of I/O.
//!
//! Authenticated builders take the bearer token as `Option<&str>`. A missing
//! token still yields a request, just without the `authorization` header, so
//! the server is the one that rejects it.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ApiError, GENERIC_FAILURE_MESSAGE};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::{
    AuthResponse, CreateTodo, ErrorBody, LoginRequest, MessageResponse, ProfileResponse,
    RegisterRequest, Todo, TodoListResponse, TodoResponse, UpdateTodo, User,
};
use crate::validate;

/// Path prefix shared by every endpoint.
pub const API_PREFIX: &str = "/api/v1";

/// Synchronous, stateless client for the todo API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // -- auth -----------------------------------------------------------

    pub fn build_register(&self, input: &RegisterRequest) -> Result<HttpRequest, ApiError> {
        self.request(HttpMethod::Post, "/auth/register", None, Some(input))
    }

    pub fn build_login(&self, input: &LoginRequest) -> Result<HttpRequest, ApiError> {
        self.request(HttpMethod::Post, "/auth/login", None, Some(input))
    }

    pub fn build_profile(&self, token: Option<&str>) -> HttpRequest {
        self.bare(HttpMethod::Get, "/auth/profile", token)
    }

    pub fn parse_register(&self, response: HttpResponse) -> Result<AuthResponse, ApiError> {
        decode(response)
    }

    pub fn parse_login(&self, response: HttpResponse) -> Result<AuthResponse, ApiError> {
        decode(response)
    }

    pub fn parse_profile(&self, response: HttpResponse) -> Result<User, ApiError> {
        decode::<ProfileResponse>(response).map(|r| r.user)
    }

    // -- todos ----------------------------------------------------------

    pub fn build_list_todos(&self, token: Option<&str>) -> HttpRequest {
        self.bare(HttpMethod::Get, "/todos", token)
    }

    /// Fails with `ApiError::Validation` when the title or description
    /// breaks the client-side limits.
    pub fn build_create_todo(
        &self,
        token: Option<&str>,
        input: &CreateTodo,
    ) -> Result<HttpRequest, ApiError> {
        validate::check_create(input)?;
        self.request(HttpMethod::Post, "/todos", token, Some(input))
    }

    pub fn build_update_todo(
        &self,
        token: Option<&str>,
        id: u64,
        input: &UpdateTodo,
    ) -> Result<HttpRequest, ApiError> {
        validate::check_update(input)?;
        self.request(HttpMethod::Put, &format!("/todos/{id}"), token, Some(input))
    }

    pub fn build_delete_todo(&self, token: Option<&str>, id: u64) -> HttpRequest {
        self.bare(HttpMethod::Delete, &format!("/todos/{id}"), token)
    }

    pub fn parse_list_todos(&self, response: HttpResponse) -> Result<Vec<Todo>, ApiError> {
        decode::<TodoListResponse>(response).map(|r| r.todos)
    }

    pub fn parse_create_todo(&self, response: HttpResponse) -> Result<Todo, ApiError> {
        decode::<TodoResponse>(response).map(|r| r.todo)
    }

    pub fn parse_update_todo(&self, response: HttpResponse) -> Result<Todo, ApiError> {
        decode::<TodoResponse>(response).map(|r| r.todo)
    }

    pub fn parse_delete_todo(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response)?;
        // The confirmation message is informational; an empty body is fine.
        if !response.body.trim().is_empty() {
            serde_json::from_str::<MessageResponse>(&response.body)
                .map_err(|e| ApiError::DeserializationError(e.to_string()))?;
        }
        Ok(())
    }

    // -- helpers --------------------------------------------------------

    fn url(&self, endpoint: &str) -> String {
        format!("{}{API_PREFIX}{endpoint}", self.base_url)
    }

    fn bare(&self, method: HttpMethod, endpoint: &str, token: Option<&str>) -> HttpRequest {
        HttpRequest {
            method,
            path: self.url(endpoint),
            headers: headers(token),
            body: None,
        }
    }

    fn request<B: Serialize>(
        &self,
        method: HttpMethod,
        endpoint: &str,
        token: Option<&str>,
        body: Option<&B>,
    ) -> Result<HttpRequest, ApiError> {
        let body = body
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| ApiError::SerializationError(e.to_string()))?;
        Ok(HttpRequest {
            method,
            path: self.url(endpoint),
            headers: headers(token),
            body,
        })
    }
}

fn headers(token: Option<&str>) -> Vec<(String, String)> {
    let mut headers = vec![("content-type".to_string(), "application/json".to_string())];
    if let Some(token) = token {
        headers.push(("authorization".to_string(), format!("Bearer {token}")));
    }
    headers
}

fn decode<T: DeserializeOwned>(response: HttpResponse) -> Result<T, ApiError> {
    check_status(&response)?;
    serde_json::from_str(&response.body).map_err(|e| ApiError::DeserializationError(e.to_string()))
}

/// Turn any non-2xx response into `ApiError::Http`, reading the server's
/// `{error}` / `{errors}` payload when there is one.
fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    let body: ErrorBody = serde_json::from_str(&response.body).unwrap_or_default();
    let message = match body.error.filter(|m| !m.trim().is_empty()) {
        Some(message) => message,
        None if !body.errors.is_empty() => {
            body.errors.values().cloned().collect::<Vec<_>>().join("; ")
        }
        None => GENERIC_FAILURE_MESSAGE.to_string(),
    };
    Err(ApiError::Http {
        status: response.status,
        message,
        fields: body.errors,
    })
}
