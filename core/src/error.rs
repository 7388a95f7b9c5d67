//! Error types for the todo API client.
//!
//! # Design
//! Every failure the core can produce is an `ApiError`. HTTP failures keep the
//! raw status code, the server's message and any per-field messages so that
//! `classify` can map them to user-facing categories without inspecting
//! wording. Client-side validation failures use the same `FieldViolation`
//! shape as server-side ones.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// Message used when a non-2xx response carries no readable error payload.
pub const GENERIC_FAILURE_MESSAGE: &str = "Request failed";

/// Input fields the server and client validate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Email,
    Password,
    Name,
    Title,
    Description,
}

impl Field {
    pub const ALL: [Field; 5] = [
        Field::Email,
        Field::Password,
        Field::Name,
        Field::Title,
        Field::Description,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Email => "email",
            Field::Password => "password",
            Field::Name => "name",
            Field::Title => "title",
            Field::Description => "description",
        }
    }

    /// Parse a field key as used in the server's `errors` map.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|field| field.as_str().eq_ignore_ascii_case(key))
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One rejected input field and the reason it was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: Field,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: Field, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Errors returned by the API client and every layer built on it.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced an HTTP response (connect, DNS, body read).
    #[error("transport failure: {0}")]
    Transport(String),

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {message}")]
    Http {
        status: u16,
        message: String,
        fields: BTreeMap<String, String>,
    },

    /// Input was rejected locally before any request was sent.
    #[error("validation failed: {}", describe(.0))]
    Validation(Vec<FieldViolation>),

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    SerializationError(String),

    /// The caller cancelled the request before it completed.
    #[error("request cancelled")]
    Cancelled,
}

impl ApiError {
    /// HTTP status of the failure, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Transport(_))
    }

    /// Server or client message carried by the error.
    pub fn message(&self) -> String {
        match self {
            ApiError::Http { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

fn describe(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|v| format!("{}: {}", v.field, v.message))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_keys_parse_case_insensitively() {
        assert_eq!(Field::from_key("Email"), Some(Field::Email));
        assert_eq!(Field::from_key("title"), Some(Field::Title));
        assert_eq!(Field::from_key("priority"), None);
    }

    #[test]
    fn validation_error_lists_every_field() {
        let err = ApiError::Validation(vec![
            FieldViolation::new(Field::Title, "Title is required"),
            FieldViolation::new(Field::Description, "too long"),
        ]);
        assert_eq!(
            err.to_string(),
            "validation failed: title: Title is required, description: too long"
        );
        assert_eq!(err.status(), None);
    }

    #[test]
    fn http_error_exposes_status_and_message() {
        let err = ApiError::Http {
            status: 401,
            message: "Invalid email or password".to_string(),
            fields: BTreeMap::new(),
        };
        assert_eq!(err.status(), Some(401));
        assert_eq!(err.message(), "Invalid email or password");
        assert_eq!(err.to_string(), "HTTP 401: Invalid email or password");
    }
}
