//! Facade wiring the client, session, auth and todo layers together.

use std::sync::Arc;

use crate::auth::AuthOperations;
use crate::cancel::CancelToken;
use crate::client::ApiClient;
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::session::{SessionSnapshot, SessionStore};
use crate::storage::{FileTokenStore, MemoryTokenStore, TokenStore};
use crate::todos::TodoStore;
use crate::transport::{ReqwestTransport, Transport};

/// Everything a presentation layer needs, sharing one session.
///
/// Cloning is cheap and every clone sees the same session and cache.
#[derive(Clone)]
pub struct TodoApp {
    api: ApiClient,
    transport: Arc<dyn Transport>,
    session: SessionStore,
    todos: TodoStore,
    auth: AuthOperations,
}

impl TodoApp {
    /// Production wiring: reqwest transport, file-backed token when
    /// `token_dir` is set.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        let transport = Arc::new(ReqwestTransport::with_timeout(config.request_timeout)?);
        let storage: Arc<dyn TokenStore> = match &config.token_dir {
            Some(dir) => Arc::new(FileTokenStore::new(dir)),
            None => Arc::new(MemoryTokenStore::new()),
        };
        Ok(Self::new(ApiClient::new(&config.base_url), transport, storage))
    }

    pub fn new(api: ApiClient, transport: Arc<dyn Transport>, storage: Arc<dyn TokenStore>) -> Self {
        let session = SessionStore::new(storage);
        let todos = TodoStore::new(api.clone(), Arc::clone(&transport), session.clone());
        let auth = AuthOperations::new(
            api.clone(),
            Arc::clone(&transport),
            session.clone(),
            todos.clone(),
        );
        Self {
            api,
            transport,
            session,
            todos,
            auth,
        }
    }

    /// Startup restoration from the persisted token. Call once before
    /// rendering anything that depends on the session.
    pub async fn start(&self) -> SessionSnapshot {
        self.start_with(&CancelToken::new()).await
    }

    pub async fn start_with(&self, cancel: &CancelToken) -> SessionSnapshot {
        self.session
            .restore(&self.api, self.transport.as_ref(), cancel)
            .await
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn auth(&self) -> &AuthOperations {
        &self.auth
    }

    pub fn todos(&self) -> &TodoStore {
        &self.todos
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }
}
