//! Login, register and logout.
//!
//! These are the only operations besides startup restoration that write the
//! session. Each returns where the presentation layer should navigate next.
//! Failures come back as the unmodified `ApiError`; use
//! [`classify`](crate::classify::classify) with [`Endpoint::Login`] or
//! [`Endpoint::Register`] to turn one into a displayable category.
//!
//! [`Endpoint::Login`]: crate::classify::Endpoint::Login
//! [`Endpoint::Register`]: crate::classify::Endpoint::Register

use std::sync::Arc;

use tracing::info;

use crate::cancel::CancelToken;
use crate::client::ApiClient;
use crate::error::ApiError;
use crate::session::SessionStore;
use crate::todos::TodoStore;
use crate::transport::{self, Transport};
use crate::types::{AuthResponse, LoginRequest, RegisterRequest};

/// Where the presentation layer should go after an auth operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    /// The authenticated area (todo list).
    Dashboard,
    /// The login screen.
    Login,
}

#[derive(Clone)]
pub struct AuthOperations {
    api: ApiClient,
    transport: Arc<dyn Transport>,
    session: SessionStore,
    todos: TodoStore,
}

impl AuthOperations {
    pub fn new(
        api: ApiClient,
        transport: Arc<dyn Transport>,
        session: SessionStore,
        todos: TodoStore,
    ) -> Self {
        Self {
            api,
            transport,
            session,
            todos,
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Navigation, ApiError> {
        self.login_with(email, password, &CancelToken::new()).await
    }

    pub async fn login_with(
        &self,
        email: &str,
        password: &str,
        cancel: &CancelToken,
    ) -> Result<Navigation, ApiError> {
        let request = self.api.build_login(&LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        })?;
        let response = transport::send(self.transport.as_ref(), request, cancel).await?;
        let auth = self.api.parse_login(response)?;
        self.enter(auth).await
    }

    /// A successful registration also logs the new user in.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<Navigation, ApiError> {
        self.register_with(email, password, name, &CancelToken::new())
            .await
    }

    pub async fn register_with(
        &self,
        email: &str,
        password: &str,
        name: &str,
        cancel: &CancelToken,
    ) -> Result<Navigation, ApiError> {
        let request = self.api.build_register(&RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
            name: name.to_string(),
        })?;
        let response = transport::send(self.transport.as_ref(), request, cancel).await?;
        let auth = self.api.parse_register(response)?;
        self.enter(auth).await
    }

    /// Local only: the token simply stops being sent. Idempotent.
    pub async fn logout(&self) -> Navigation {
        self.session.clear().await;
        self.todos.reset().await;
        info!("logged out");
        Navigation::Login
    }

    async fn enter(&self, auth: AuthResponse) -> Result<Navigation, ApiError> {
        info!(user_id = auth.user.id, "authenticated");
        self.session.establish(auth.token, auth.user).await;
        // Whatever was cached belonged to the previous identity.
        self.todos.invalidate().await;
        Ok(Navigation::Dashboard)
    }
}
