//! Authenticated identity held by the client.
//!
//! # Design
//! `SessionStore` is a cloneable handle: the auth operations, the todo layer
//! and the presentation layer each hold a clone and see the same state. Only
//! `establish`, `clear` and `restore` write it. The state lock is never held
//! across a network await.
//!
//! Lifecycle:
//!
//! ```text
//! Restoring --(stored token + profile ok)--> Authenticated
//! Restoring --(no token | profile failed)--> Anonymous
//! Anonymous --(establish)--> Authenticated
//! Authenticated --(clear)--> Anonymous
//! ```
//!
//! Restoration is attempted once; a failed restoration is terminal until the
//! user logs in again.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::client::ApiClient;
use crate::error::ApiError;
use crate::storage::TokenStore;
use crate::transport::{self, Transport};
use crate::types::User;

/// A bearer token together with the user it authenticates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Startup restoration has not finished yet.
    Restoring,
    Authenticated(Session),
    Anonymous,
}

/// Flattened view of the session for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub user: Option<User>,
    pub token: Option<String>,
    pub restoring: bool,
}

impl SessionSnapshot {
    /// No user and restoration finished: the login screen applies.
    pub fn must_authenticate(&self) -> bool {
        self.user.is_none() && !self.restoring
    }
}

impl From<&SessionState> for SessionSnapshot {
    fn from(state: &SessionState) -> Self {
        match state {
            SessionState::Restoring => SessionSnapshot {
                user: None,
                token: None,
                restoring: true,
            },
            SessionState::Authenticated(session) => SessionSnapshot {
                user: Some(session.user.clone()),
                token: Some(session.token.clone()),
                restoring: false,
            },
            SessionState::Anonymous => SessionSnapshot {
                user: None,
                token: None,
                restoring: false,
            },
        }
    }
}

#[derive(Clone)]
pub struct SessionStore {
    state: Arc<RwLock<SessionState>>,
    storage: Arc<dyn TokenStore>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn TokenStore>) -> Self {
        Self {
            state: Arc::new(RwLock::new(SessionState::Restoring)),
            storage,
        }
    }

    pub async fn state(&self) -> SessionState {
        self.state.read().await.clone()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::from(&*self.state.read().await)
    }

    pub async fn user(&self) -> Option<User> {
        match &*self.state.read().await {
            SessionState::Authenticated(session) => Some(session.user.clone()),
            _ => None,
        }
    }

    pub async fn token(&self) -> Option<String> {
        match &*self.state.read().await {
            SessionState::Authenticated(session) => Some(session.token.clone()),
            _ => None,
        }
    }

    pub async fn is_restoring(&self) -> bool {
        matches!(*self.state.read().await, SessionState::Restoring)
    }

    pub async fn must_authenticate(&self) -> bool {
        self.snapshot().await.must_authenticate()
    }

    /// Record a freshly issued token and its user, persisting the token.
    ///
    /// A storage failure is logged and the in-memory session still becomes
    /// authenticated; it just will not survive a restart.
    pub async fn establish(&self, token: String, user: User) {
        if let Err(e) = self.storage.save(&token) {
            warn!(error = %e, "failed to persist session token");
        }
        let mut state = self.state.write().await;
        info!(user_id = user.id, "session established");
        *state = SessionState::Authenticated(Session { token, user });
    }

    /// Drop the session and the persisted token. Safe to call when already
    /// anonymous.
    pub async fn clear(&self) {
        if let Err(e) = self.storage.remove() {
            warn!(error = %e, "failed to remove persisted session token");
        }
        let mut state = self.state.write().await;
        if matches!(*state, SessionState::Authenticated(_)) {
            info!("session cleared");
        }
        *state = SessionState::Anonymous;
    }

    /// Restore the session from the persisted token by fetching the profile.
    ///
    /// Any failure of the profile fetch discards the stored token and leaves
    /// the store anonymous; the error is not surfaced. Cancellation leaves the
    /// store anonymous but keeps the stored token for the next start. When
    /// the store is no longer restoring (already restored, or a login won the
    /// race) this returns the current snapshot without touching anything.
    pub async fn restore(
        &self,
        api: &ApiClient,
        transport: &dyn Transport,
        cancel: &CancelToken,
    ) -> SessionSnapshot {
        if !self.is_restoring().await {
            return self.snapshot().await;
        }

        let stored = match self.storage.load() {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "failed to read persisted session token");
                None
            }
        };

        let Some(token) = stored else {
            debug!("no persisted session token");
            return self.finish_restore(None, false).await;
        };

        let result = match transport::send(transport, api.build_profile(Some(&token)), cancel).await {
            Ok(response) => api.parse_profile(response),
            Err(e) => Err(e),
        };

        match result {
            Ok(user) => {
                self.finish_restore(Some(Session { token, user }), false)
                    .await
            }
            Err(ApiError::Cancelled) => {
                debug!("session restoration cancelled");
                self.finish_restore(None, false).await
            }
            Err(e) => {
                debug!(error = %e, "persisted session token rejected");
                self.finish_restore(None, true).await
            }
        }
    }

    async fn finish_restore(&self, session: Option<Session>, discard: bool) -> SessionSnapshot {
        let mut state = self.state.write().await;
        if !matches!(*state, SessionState::Restoring) {
            return SessionSnapshot::from(&*state);
        }
        if discard {
            if let Err(e) = self.storage.remove() {
                warn!(error = %e, "failed to remove rejected session token");
            }
        }
        *state = match session {
            Some(session) => {
                info!(user_id = session.user.id, "session restored");
                SessionState::Authenticated(session)
            }
            None => SessionState::Anonymous,
        };
        SessionSnapshot::from(&*state)
    }
}
