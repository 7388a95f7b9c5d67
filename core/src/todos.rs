//! Todo collection queries and mutations scoped to the current session.
//!
//! # Design
//! Reads go through a `QueryCache` entry under [`TODOS_KEY`]. Mutations never
//! touch cached data: once the server acknowledges a create, update or
//! delete, the entry is invalidated and the next `list` refetches the whole
//! collection. A mutation the server rejected leaves the cache exactly as it
//! was, since nothing was applied locally. Once a mutation request has been
//! handed to the transport, any outcome other than a server rejection
//! (success, cancellation, transport failure, or the future being dropped)
//! invalidates the entry, because the server may have applied it.
//!
//! The cache sits behind a `std::sync::RwLock` that is never held across an
//! await, so the invalidation can also run from a `Drop` impl.
//!
//! The server scopes every call by the bearer token; no user id is ever sent.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};

use crate::cache::QueryCache;
use crate::cancel::CancelToken;
use crate::client::ApiClient;
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};
use crate::session::SessionStore;
use crate::transport::{self, Transport};
use crate::types::{CreateTodo, Todo, UpdateTodo};

/// Cache key of the todo collection.
pub const TODOS_KEY: &str = "todos";

#[derive(Clone)]
pub struct TodoStore {
    api: ApiClient,
    transport: Arc<dyn Transport>,
    session: SessionStore,
    cache: Arc<RwLock<QueryCache<Vec<Todo>>>>,
    pending: Arc<AtomicUsize>,
    fetching: Arc<AtomicUsize>,
}

impl TodoStore {
    pub fn new(api: ApiClient, transport: Arc<dyn Transport>, session: SessionStore) -> Self {
        Self {
            api,
            transport,
            session,
            cache: Arc::new(RwLock::new(QueryCache::new())),
            pending: Arc::new(AtomicUsize::new(0)),
            fetching: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn read_cache(&self) -> RwLockReadGuard<'_, QueryCache<Vec<Todo>>> {
        // A poisoned lock still holds a consistent cache.
        self.cache.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_cache(&self) -> RwLockWriteGuard<'_, QueryCache<Vec<Todo>>> {
        self.cache.write().unwrap_or_else(|e| e.into_inner())
    }

    // -- queries --------------------------------------------------------

    pub async fn list(&self) -> Result<Vec<Todo>, ApiError> {
        self.list_with(&CancelToken::new()).await
    }

    /// Cached collection when fresh, otherwise a full fetch.
    pub async fn list_with(&self, cancel: &CancelToken) -> Result<Vec<Todo>, ApiError> {
        let cached = self.read_cache().fresh(TODOS_KEY);
        if let Some(todos) = cached {
            debug!(count = todos.len(), "todo cache hit");
            return Ok(todos);
        }
        self.refetch_with(cancel).await
    }

    pub async fn refetch(&self) -> Result<Vec<Todo>, ApiError> {
        self.refetch_with(&CancelToken::new()).await
    }

    /// Fetch the collection regardless of cache state and store the result,
    /// unless the cache was invalidated while the request was in flight.
    pub async fn refetch_with(&self, cancel: &CancelToken) -> Result<Vec<Todo>, ApiError> {
        let generation = self.read_cache().generation(TODOS_KEY);
        let token = self.session.token().await;
        let request = self.api.build_list_todos(token.as_deref());

        let todos = {
            let _fetching = InFlight::enter(&self.fetching);
            let response = transport::send(self.transport.as_ref(), request, cancel).await?;
            self.api.parse_list_todos(response)?
        };

        let stored = self
            .write_cache()
            .store(TODOS_KEY, generation, todos.clone());
        if stored {
            debug!(count = todos.len(), "todo cache refreshed");
        } else {
            debug!("discarding todo list fetched before invalidation");
        }
        Ok(todos)
    }

    /// Last fetched collection, fresh or stale.
    pub async fn cached(&self) -> Option<Vec<Todo>> {
        self.read_cache().peek(TODOS_KEY)
    }

    pub async fn is_stale(&self) -> bool {
        self.read_cache().is_stale(TODOS_KEY)
    }

    // -- mutations ------------------------------------------------------

    pub async fn create(&self, input: CreateTodo) -> Result<Todo, ApiError> {
        self.create_with(input, &CancelToken::new()).await
    }

    /// Title and description limits are checked before any request is sent.
    pub async fn create_with(
        &self,
        input: CreateTodo,
        cancel: &CancelToken,
    ) -> Result<Todo, ApiError> {
        let token = self.session.token().await;
        let request = self.api.build_create_todo(token.as_deref(), &input)?;
        let todo = self
            .mutate(request, cancel, ApiClient::parse_create_todo)
            .await?;
        info!(todo_id = todo.id, "todo created");
        Ok(todo)
    }

    pub async fn update(&self, id: u64, input: UpdateTodo) -> Result<Todo, ApiError> {
        self.update_with(id, input, &CancelToken::new()).await
    }

    /// Fields left as `None` are not sent and stay unchanged on the server.
    pub async fn update_with(
        &self,
        id: u64,
        input: UpdateTodo,
        cancel: &CancelToken,
    ) -> Result<Todo, ApiError> {
        let token = self.session.token().await;
        let request = self.api.build_update_todo(token.as_deref(), id, &input)?;
        let todo = self
            .mutate(request, cancel, ApiClient::parse_update_todo)
            .await?;
        info!(todo_id = todo.id, "todo updated");
        Ok(todo)
    }

    /// Flip the completed flag of `todo`.
    pub async fn toggle(&self, todo: &Todo) -> Result<Todo, ApiError> {
        self.update(todo.id, UpdateTodo::completed(!todo.completed))
            .await
    }

    pub async fn delete(&self, id: u64) -> Result<(), ApiError> {
        self.delete_with(id, &CancelToken::new()).await
    }

    pub async fn delete_with(&self, id: u64, cancel: &CancelToken) -> Result<(), ApiError> {
        let token = self.session.token().await;
        let request = self.api.build_delete_todo(token.as_deref(), id);
        self.mutate(request, cancel, ApiClient::parse_delete_todo)
            .await?;
        info!(todo_id = id, "todo deleted");
        Ok(())
    }

    // -- cache control --------------------------------------------------

    /// Mark the collection stale so the next `list` refetches.
    pub async fn invalidate(&self) {
        self.write_cache().invalidate(TODOS_KEY);
        debug!("todo cache invalidated");
    }

    /// Drop the cached collection entirely.
    pub async fn reset(&self) {
        self.write_cache().reset(TODOS_KEY);
        debug!("todo cache reset");
    }

    // -- in-flight state ------------------------------------------------

    /// Number of mutations awaiting a response. Controls that trigger
    /// mutations should stay disabled while this is non-zero.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn is_fetching(&self) -> bool {
        self.fetching.load(Ordering::SeqCst) > 0
    }

    async fn mutate<T>(
        &self,
        request: HttpRequest,
        cancel: &CancelToken,
        parse: impl FnOnce(&ApiClient, HttpResponse) -> Result<T, ApiError>,
    ) -> Result<T, ApiError> {
        let _pending = InFlight::enter(&self.pending);
        if cancel.is_cancelled() {
            return Err(ApiError::Cancelled);
        }

        let mut outcome = Unsettled::arm(&self.cache);
        let result = match transport::send(self.transport.as_ref(), request, cancel).await {
            Ok(response) => parse(&self.api, response),
            Err(e) => Err(e),
        };
        if let Err(ApiError::Http { status, .. }) = &result {
            debug!(status, "mutation rejected by server");
            outcome.disarm();
        }
        result
    }
}

/// Counts an operation as in flight until dropped, including when the
/// owning future is dropped mid-request.
struct InFlight {
    counter: Arc<AtomicUsize>,
}

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self {
            counter: Arc::clone(counter),
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Invalidates the todo collection when dropped unless disarmed. Armed as
/// soon as a mutation request leaves for the server.
struct Unsettled {
    cache: Arc<RwLock<QueryCache<Vec<Todo>>>>,
    armed: bool,
}

impl Unsettled {
    fn arm(cache: &Arc<RwLock<QueryCache<Vec<Todo>>>>) -> Self {
        Self {
            cache: Arc::clone(cache),
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for Unsettled {
    fn drop(&mut self) {
        if self.armed {
            self.cache
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .invalidate(TODOS_KEY);
            debug!("todo cache invalidated");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryTokenStore;
    use crate::testing::{todo_json, GatedTransport, ScriptedTransport, USER_JSON};

    async fn store(transport: Arc<dyn Transport>) -> TodoStore {
        let session = SessionStore::new(Arc::new(MemoryTokenStore::new()));
        session
            .establish("tok".to_string(), serde_json::from_str(USER_JSON).unwrap())
            .await;
        TodoStore::new(ApiClient::new("http://localhost:8080"), transport, session)
    }

    fn list_body(todos: &[String]) -> String {
        format!(r#"{{"todos":[{}]}}"#, todos.join(","))
    }

    fn created_body(id: u64, title: &str) -> String {
        format!(
            r#"{{"message":"Todo created successfully","todo":{}}}"#,
            todo_json(id, title)
        )
    }

    #[tokio::test]
    async fn fresh_cache_serves_list_without_network() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(200, &list_body(&[todo_json(1, "a")]));
        let todos = store(transport.clone()).await;

        assert_eq!(todos.list().await.unwrap().len(), 1);
        assert_eq!(todos.list().await.unwrap().len(), 1);
        assert_eq!(transport.requests().len(), 1);
        assert_eq!(
            transport.requests()[0].header("authorization"),
            Some("Bearer tok")
        );
    }

    #[tokio::test]
    async fn successful_mutation_invalidates_cache() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(200, &list_body(&[]));
        transport.push(201, &created_body(5, "X"));
        transport.push(200, &list_body(&[todo_json(5, "X")]));
        let todos = store(transport.clone()).await;

        assert!(todos.list().await.unwrap().is_empty());
        assert_eq!(todos.pending(), 0);
        let created = todos.create(CreateTodo::new("X")).await.unwrap();
        assert_eq!(created.id, 5);
        assert!(todos.is_stale().await);
        assert_eq!(todos.pending(), 0);

        let listed = todos.list().await.unwrap();
        assert_eq!(listed[0].title, "X");
        assert_eq!(transport.requests().len(), 3);
    }

    #[tokio::test]
    async fn failed_mutation_leaves_cache_untouched() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(200, &list_body(&[todo_json(1, "a")]));
        transport.push(404, r#"{"error":"Todo not found"}"#);
        let todos = store(transport.clone()).await;

        todos.list().await.unwrap();
        let err = todos.delete(99).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert!(!todos.is_stale().await);
        assert_eq!(todos.list().await.unwrap().len(), 1);
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn invalid_title_never_reaches_the_network() {
        let transport = Arc::new(ScriptedTransport::new());
        let todos = store(transport.clone()).await;

        let err = todos
            .create(CreateTodo::new("t".repeat(201)))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        let err = todos
            .create(CreateTodo::new("t").with_description("d".repeat(1001)))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn cancelled_mutation_does_not_invalidate() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(200, &list_body(&[]));
        let todos = store(transport.clone()).await;
        todos.list().await.unwrap();

        let cancel = CancelToken::new();
        cancel.cancel();
        let err = todos
            .update_with(1, UpdateTodo::completed(true), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Cancelled));
        assert!(!todos.is_stale().await);
        assert_eq!(todos.pending(), 0);
    }

    #[tokio::test]
    async fn reset_forgets_cached_collection() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(200, &list_body(&[todo_json(1, "a")]));
        let todos = store(transport).await;
        todos.list().await.unwrap();

        todos.reset().await;
        assert_eq!(todos.cached().await, None);
    }

    #[tokio::test]
    async fn mutation_cancelled_after_sending_invalidates_cache() {
        let transport = Arc::new(GatedTransport::new());
        transport.inner.push(200, &list_body(&[]));
        transport.inner.push(201, &created_body(7, "X"));
        transport.inner.push(200, &list_body(&[todo_json(7, "X")]));
        let todos = store(transport.clone()).await;

        transport.release();
        assert!(todos.list().await.unwrap().is_empty());

        let cancel = CancelToken::new();
        let create = tokio::spawn({
            let todos = todos.clone();
            let cancel = cancel.clone();
            async move { todos.create_with(CreateTodo::new("X"), &cancel).await }
        });
        // The server has the todo; its acknowledgement is still held back.
        transport.wait_for_requests(2).await;
        cancel.cancel();

        let err = create.await.unwrap().unwrap_err();
        assert!(matches!(err, ApiError::Cancelled));
        assert!(todos.is_stale().await);
        assert_eq!(todos.pending(), 0);

        transport.release();
        let listed = todos.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, 7);
    }

    #[tokio::test]
    async fn mutation_dropped_mid_request_invalidates_cache() {
        let transport = Arc::new(GatedTransport::new());
        transport.inner.push(200, &list_body(&[todo_json(1, "a")]));
        transport.inner.push(200, r#"{"message":"Todo deleted successfully"}"#);
        let todos = store(transport.clone()).await;

        transport.release();
        todos.list().await.unwrap();

        let delete = tokio::spawn({
            let todos = todos.clone();
            async move { todos.delete(1).await }
        });
        transport.wait_for_requests(2).await;
        assert_eq!(todos.pending(), 1);

        delete.abort();
        assert!(delete.await.unwrap_err().is_cancelled());
        assert!(todos.is_stale().await);
        assert_eq!(todos.pending(), 0);
    }

    #[tokio::test]
    async fn list_fetched_across_invalidation_is_not_cached() {
        let transport = Arc::new(GatedTransport::new());
        transport.inner.push(200, &list_body(&[todo_json(1, "old")]));
        transport
            .inner
            .push(200, &list_body(&[todo_json(1, "old"), todo_json(2, "new")]));
        let todos = store(transport.clone()).await;

        let fetch = tokio::spawn({
            let todos = todos.clone();
            async move { todos.list().await }
        });
        transport.wait_for_requests(1).await;
        assert!(todos.is_fetching());
        todos.invalidate().await;
        transport.release();

        // The caller still gets what it asked for.
        assert_eq!(fetch.await.unwrap().unwrap().len(), 1);
        assert!(todos.is_stale().await);
        assert_eq!(todos.cached().await, None);

        transport.release();
        assert_eq!(todos.list().await.unwrap().len(), 2);
        assert_eq!(transport.inner.requests().len(), 2);
    }
}
