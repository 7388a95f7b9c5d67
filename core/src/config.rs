//! Client configuration.
//!
//! Values come from the environment:
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `TODO_API_URL` | server base URL | `http://localhost:8080` |
//! | `TODO_TOKEN_DIR` | directory for the persisted token | none (memory only) |
//! | `TODO_REQUEST_TIMEOUT_SECS` | per-request timeout | none |

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

pub const ENV_BASE_URL: &str = "TODO_API_URL";
pub const ENV_TOKEN_DIR: &str = "TODO_TOKEN_DIR";
pub const ENV_REQUEST_TIMEOUT: &str = "TODO_REQUEST_TIMEOUT_SECS";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must start with http:// or https://, got {value:?}")]
    InvalidUrl { var: &'static str, value: String },

    #[error("{var} must be a positive number of seconds, got {value:?}")]
    InvalidTimeout { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    /// Where the session token is persisted. `None` keeps it in memory.
    pub token_dir: Option<PathBuf>,
    /// `None` leaves timeouts to the transport's defaults.
    pub request_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token_dir: None,
            request_timeout: None,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(url) = get(ENV_BASE_URL) {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidUrl {
                    var: ENV_BASE_URL,
                    value: url,
                });
            }
            config.base_url = url;
        }

        config.token_dir = get(ENV_TOKEN_DIR).map(PathBuf::from);

        if let Some(raw) = get(ENV_REQUEST_TIMEOUT) {
            let secs = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| ConfigError::InvalidTimeout {
                    var: ENV_REQUEST_TIMEOUT,
                    value: raw.clone(),
                })?;
            config.request_timeout = Some(Duration::from_secs(secs));
        }

        Ok(config)
    }
}
