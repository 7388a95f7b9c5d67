//! Session and data-synchronization core for the todo service.
//!
//! # Overview
//! Authenticates against the todo REST API with bearer tokens, persists and
//! restores the session token, and keeps a local read cache of the todo
//! collection in step with the server.
//!
//! # Design
//! - `ApiClient` is stateless: `build_*` produces an `HttpRequest`, `parse_*`
//!   consumes an `HttpResponse`. A `Transport` does the I/O in between.
//! - `SessionStore` is an explicit, cloneable handle. Only auth operations
//!   and startup restoration write it.
//! - `TodoStore` never patches cached data. Successful mutations invalidate
//!   the collection and the next read refetches it.
//! - `classify` maps errors to user-facing categories by status code and
//!   field name, not by message wording.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod app;
pub mod auth;
pub mod cache;
pub mod cancel;
pub mod classify;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod session;
pub mod storage;
pub mod todos;
pub mod transport;
pub mod types;
mod validate;

#[cfg(test)]
mod testing;

pub use app::TodoApp;
pub use auth::{AuthOperations, Navigation};
pub use cancel::CancelToken;
pub use classify::{classify, Endpoint, Failure};
pub use client::ApiClient;
pub use config::{ClientConfig, ConfigError};
pub use error::{ApiError, Field, FieldViolation};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use session::{Session, SessionSnapshot, SessionState, SessionStore};
pub use storage::{FileTokenStore, MemoryTokenStore, StorageError, TokenStore};
pub use todos::TodoStore;
pub use transport::{ReqwestTransport, Transport};
pub use types::{CreateTodo, Todo, UpdateTodo, User};
