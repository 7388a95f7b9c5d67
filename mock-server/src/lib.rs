//! In-memory implementation of the todo REST API.
//!
//! Serves `/api/v1/auth/*` and `/api/v1/todos*` with bearer-token auth. Users,
//! issued tokens and todos live in a single `RwLock`ed store and vanish when
//! the router is dropped. Passwords are kept as given; this server exists for
//! tests and local development only.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, FromRequestParts, Path, State},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};
use uuid::Uuid;

pub const MAX_TITLE_LEN: usize = 255;
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: u64,
    pub email: String,
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Todo {
    pub id: u64,
    pub title: String,
    pub description: String,
    pub completed: bool,
    pub user_id: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct RegisterInput {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Deserialize)]
pub struct LoginInput {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
pub struct CreateTodo {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Deserialize)]
pub struct UpdateTodo {
    pub title: Option<String>,
    pub description: Option<String>,
    pub completed: Option<bool>,
}

struct Account {
    user: User,
    password: String,
}

#[derive(Default)]
pub struct Store {
    accounts: HashMap<u64, Account>,
    emails: HashMap<String, u64>,
    tokens: HashMap<String, u64>,
    todos: BTreeMap<u64, Todo>,
    next_user_id: u64,
    next_todo_id: u64,
}

impl Store {
    fn issue_token(&mut self, user_id: u64) -> String {
        let token = Uuid::new_v4().simple().to_string();
        self.tokens.insert(token.clone(), user_id);
        token
    }

    fn owned_todo_mut(&mut self, user_id: u64, id: u64) -> Result<&mut Todo, Failure> {
        self.todos
            .get_mut(&id)
            .filter(|todo| todo.user_id == user_id)
            .ok_or_else(|| Failure::message(StatusCode::NOT_FOUND, "Todo not found"))
    }
}

pub type Db = Arc<RwLock<Store>>;

/// Error response: `{"error": ...}` or `{"errors": {field: ...}}`.
#[derive(Debug)]
pub struct Failure {
    status: StatusCode,
    body: serde_json::Value,
}

impl Failure {
    fn message(status: StatusCode, message: &str) -> Self {
        Self {
            status,
            body: json!({ "error": message }),
        }
    }

    fn fields(fields: BTreeMap<&'static str, String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: json!({ "errors": fields }),
        }
    }

    fn bad_body(rejection: JsonRejection) -> Self {
        debug!(%rejection, "rejected request body");
        Self::message(StatusCode::BAD_REQUEST, "Invalid request body")
    }

    fn bad_id(rejection: PathRejection) -> Self {
        debug!(%rejection, "rejected todo id");
        Self::message(StatusCode::BAD_REQUEST, "Invalid todo ID")
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// The user a valid bearer token belongs to.
pub struct CurrentUser(pub u64);

impl FromRequestParts<Db> for CurrentUser {
    type Rejection = Failure;

    async fn from_request_parts(parts: &mut Parts, db: &Db) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                Failure::message(StatusCode::UNAUTHORIZED, "Authorization header is required")
            })?;
        let token = header.strip_prefix("Bearer ").ok_or_else(|| {
            Failure::message(
                StatusCode::UNAUTHORIZED,
                "Authorization header format must be Bearer {token}",
            )
        })?;
        let store = db.read().await;
        store
            .tokens
            .get(token)
            .copied()
            .map(CurrentUser)
            .ok_or_else(|| Failure::message(StatusCode::UNAUTHORIZED, "Invalid or expired token"))
    }
}

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::default()));
    let api: Router<Db> = Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/profile", get(profile))
        .route("/todos", get(list_todos).post(create_todo))
        .route(
            "/todos/{id}",
            get(get_todo).put(update_todo).delete(delete_todo),
        );
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api)
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

fn valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

async fn register(
    State(db): State<Db>,
    input: Result<Json<RegisterInput>, JsonRejection>,
) -> Result<(StatusCode, Json<serde_json::Value>), Failure> {
    let Json(input) = input.map_err(Failure::bad_body)?;

    let mut errors = BTreeMap::new();
    if !valid_email(&input.email) {
        errors.insert("email", "Invalid email format".to_string());
    }
    if input.password.chars().count() < MIN_PASSWORD_LEN {
        errors.insert("password", "Password must be at least 6 characters".to_string());
    }
    if input.name.trim().is_empty() {
        errors.insert("name", "Name is required".to_string());
    }
    if !errors.is_empty() {
        return Err(Failure::fields(errors));
    }

    let mut store = db.write().await;
    if store.emails.contains_key(&input.email) {
        return Err(Failure::message(StatusCode::CONFLICT, "User already exists"));
    }
    store.next_user_id += 1;
    let user = User {
        id: store.next_user_id,
        email: input.email,
        name: input.name.trim().to_string(),
    };
    store.emails.insert(user.email.clone(), user.id);
    store.accounts.insert(
        user.id,
        Account {
            user: user.clone(),
            password: input.password,
        },
    );
    let token = store.issue_token(user.id);
    info!(user_id = user.id, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User registered successfully", "user": user, "token": token })),
    ))
}

async fn login(
    State(db): State<Db>,
    input: Result<Json<LoginInput>, JsonRejection>,
) -> Result<Json<serde_json::Value>, Failure> {
    let Json(input) = input.map_err(Failure::bad_body)?;
    if !valid_email(&input.email) {
        return Err(Failure::message(
            StatusCode::BAD_REQUEST,
            "validation failed: email must be a valid email address",
        ));
    }
    if input.password.is_empty() {
        return Err(Failure::message(
            StatusCode::BAD_REQUEST,
            "validation failed: password is required",
        ));
    }

    let mut store = db.write().await;
    let user = store
        .emails
        .get(&input.email)
        .and_then(|id| store.accounts.get(id))
        .filter(|account| account.password == input.password)
        .map(|account| account.user.clone())
        .ok_or_else(|| Failure::message(StatusCode::UNAUTHORIZED, "Invalid email or password"))?;
    let token = store.issue_token(user.id);
    info!(user_id = user.id, "user logged in");

    Ok(Json(json!({ "message": "Login successful", "user": user, "token": token })))
}

async fn profile(
    State(db): State<Db>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<serde_json::Value>, Failure> {
    let store = db.read().await;
    let account = store
        .accounts
        .get(&user_id)
        .ok_or_else(|| Failure::message(StatusCode::NOT_FOUND, "User not found"))?;
    Ok(Json(json!({ "user": account.user })))
}

async fn list_todos(
    State(db): State<Db>,
    CurrentUser(user_id): CurrentUser,
) -> Json<serde_json::Value> {
    let store = db.read().await;
    let todos: Vec<&Todo> = store
        .todos
        .values()
        .filter(|todo| todo.user_id == user_id)
        .collect();
    Json(json!({ "todos": todos }))
}

fn check_title(title: &str) -> Result<String, Failure> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(Failure::fields(BTreeMap::from([(
            "title",
            "Title is required".to_string(),
        )])));
    }
    if trimmed.chars().count() > MAX_TITLE_LEN {
        return Err(Failure::fields(BTreeMap::from([(
            "title",
            format!("Title must be at most {MAX_TITLE_LEN} characters"),
        )])));
    }
    Ok(trimmed.to_string())
}

async fn create_todo(
    State(db): State<Db>,
    CurrentUser(user_id): CurrentUser,
    input: Result<Json<CreateTodo>, JsonRejection>,
) -> Result<(StatusCode, Json<serde_json::Value>), Failure> {
    let Json(input) = input.map_err(Failure::bad_body)?;
    let title = check_title(&input.title)?;

    let mut store = db.write().await;
    store.next_todo_id += 1;
    let now = Utc::now();
    let todo = Todo {
        id: store.next_todo_id,
        title,
        description: input.description,
        completed: false,
        user_id,
        created_at: now,
        updated_at: now,
    };
    store.todos.insert(todo.id, todo.clone());
    info!(todo_id = todo.id, user_id, "todo created");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Todo created successfully", "todo": todo })),
    ))
}

async fn get_todo(
    State(db): State<Db>,
    CurrentUser(user_id): CurrentUser,
    id: Result<Path<u64>, PathRejection>,
) -> Result<Json<serde_json::Value>, Failure> {
    let Path(id) = id.map_err(Failure::bad_id)?;
    let store = db.read().await;
    let todo = store
        .todos
        .get(&id)
        .filter(|todo| todo.user_id == user_id)
        .ok_or_else(|| Failure::message(StatusCode::NOT_FOUND, "Todo not found"))?;
    Ok(Json(json!({ "todo": todo })))
}

async fn update_todo(
    State(db): State<Db>,
    CurrentUser(user_id): CurrentUser,
    id: Result<Path<u64>, PathRejection>,
    input: Result<Json<UpdateTodo>, JsonRejection>,
) -> Result<Json<serde_json::Value>, Failure> {
    let Path(id) = id.map_err(Failure::bad_id)?;
    let Json(input) = input.map_err(Failure::bad_body)?;
    let title = input.title.as_deref().map(check_title).transpose()?;

    let mut store = db.write().await;
    let todo = store.owned_todo_mut(user_id, id)?;
    if let Some(title) = title {
        todo.title = title;
    }
    if let Some(description) = input.description {
        todo.description = description;
    }
    if let Some(completed) = input.completed {
        todo.completed = completed;
    }
    todo.updated_at = Utc::now();
    let todo = todo.clone();
    info!(todo_id = todo.id, user_id, "todo updated");

    Ok(Json(json!({ "message": "Todo updated successfully", "todo": todo })))
}

async fn delete_todo(
    State(db): State<Db>,
    CurrentUser(user_id): CurrentUser,
    id: Result<Path<u64>, PathRejection>,
) -> Result<Json<serde_json::Value>, Failure> {
    let Path(id) = id.map_err(Failure::bad_id)?;
    let mut store = db.write().await;
    store.owned_todo_mut(user_id, id)?;
    store.todos.remove(&id);
    info!(todo_id = id, user_id, "todo deleted");
    Ok(Json(json!({ "message": "Todo deleted successfully" })))
}
