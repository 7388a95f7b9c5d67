//! Maps `ApiError` values to user-facing failure categories.
//!
//! # Design
//! Classification is table driven: the HTTP status decides the category and
//! the endpoint disambiguates 401 (bad credentials on login, rejected session
//! everywhere else). For 400 responses the per-field `errors` map sent by
//! the server names the offending fields. Message text is only inspected
//! when a 400 arrives without that map, and only to find field names. When
//! it names exactly one field, the server's wording is kept.

use crate::error::{ApiError, Field, FieldViolation};

/// The endpoint family a failed call belonged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Login,
    Register,
    Profile,
    Todos,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// No response from the server at all.
    NetworkUnreachable,
    /// 401 on login or register. Never says which credential was wrong.
    InvalidCredentials,
    /// 401 on an authenticated endpoint: the token is no longer accepted.
    SessionRejected,
    /// Field-level rejection. Empty when the server gave no field detail.
    Validation(Vec<FieldViolation>),
    AlreadyExists,
    NotFound,
    Server,
    Cancelled,
    Unexpected(String),
}

impl Failure {
    /// Text suitable for showing next to the form that failed.
    pub fn user_message(&self) -> String {
        match self {
            Failure::NetworkUnreachable => "Unable to reach the server".to_string(),
            Failure::InvalidCredentials => "Invalid email or password".to_string(),
            Failure::SessionRejected => "Your session has expired, please log in again".to_string(),
            Failure::Validation(violations) if violations.is_empty() => {
                "Validation error".to_string()
            }
            Failure::Validation(violations) => violations
                .iter()
                .map(|v| v.message.as_str())
                .collect::<Vec<_>>()
                .join("; "),
            Failure::AlreadyExists => "User already exists".to_string(),
            Failure::NotFound => "Todo not found".to_string(),
            Failure::Server => "Something went wrong on the server".to_string(),
            Failure::Cancelled => "Request cancelled".to_string(),
            Failure::Unexpected(message) => message.clone(),
        }
    }

    /// Violation for `field`, if this is a validation failure naming it.
    pub fn violation(&self, field: Field) -> Option<&FieldViolation> {
        match self {
            Failure::Validation(violations) => violations.iter().find(|v| v.field == field),
            _ => None,
        }
    }
}

pub fn classify(endpoint: Endpoint, err: &ApiError) -> Failure {
    match err {
        ApiError::Transport(_) => Failure::NetworkUnreachable,
        ApiError::Cancelled => Failure::Cancelled,
        ApiError::Validation(violations) => Failure::Validation(violations.clone()),
        ApiError::Http {
            status,
            message,
            fields,
        } => match (*status, endpoint) {
            (401, Endpoint::Login | Endpoint::Register) => Failure::InvalidCredentials,
            (401, _) => Failure::SessionRejected,
            (400, _) | (422, _) => Failure::Validation(field_violations(message, fields)),
            (404, _) => Failure::NotFound,
            (409, _) => Failure::AlreadyExists,
            (500..=599, _) => Failure::Server,
            _ => Failure::Unexpected(message.clone()),
        },
        ApiError::DeserializationError(_) | ApiError::SerializationError(_) => {
            Failure::Unexpected(err.to_string())
        }
    }
}

fn field_violations(
    message: &str,
    fields: &std::collections::BTreeMap<String, String>,
) -> Vec<FieldViolation> {
    if !fields.is_empty() {
        return fields
            .iter()
            .filter_map(|(key, text)| {
                Field::from_key(key).map(|field| FieldViolation::new(field, text.clone()))
            })
            .collect();
    }

    // No structured detail; look for field names as whole words in the message.
    let lower = message.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .collect();
    let named: Vec<Field> = Field::ALL
        .into_iter()
        .filter(|field| words.contains(&field.as_str()))
        .collect();

    if let [field] = named[..] {
        return vec![FieldViolation::new(field, server_text(message))];
    }
    named
        .into_iter()
        .map(|field| FieldViolation::new(field, default_message(field)))
        .collect()
}

/// The server's message without its `validation failed:` prefix.
fn server_text(message: &str) -> &str {
    let trimmed = message.trim();
    match trimmed.split_once(':') {
        Some((head, rest)) if head.trim().eq_ignore_ascii_case("validation failed") => rest.trim(),
        _ => trimmed,
    }
}

fn default_message(field: Field) -> &'static str {
    match field {
        Field::Email => "Invalid email format",
        Field::Password => "Password must be at least 6 characters",
        Field::Name => "Name is required",
        Field::Title => "Title is required",
        Field::Description => "Description is too long",
    }
}
