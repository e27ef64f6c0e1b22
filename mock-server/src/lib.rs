use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub created_at: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
    pub user: UserResponse,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
}

#[derive(Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct CreateTask {
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Deserialize)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<String>,
    pub completed: Option<bool>,
}

#[derive(Deserialize)]
pub struct TaskCompletion {
    pub completed: bool,
}

struct Account {
    user: UserResponse,
    password: String,
}

#[derive(Default)]
pub struct Store {
    accounts: HashMap<String, Account>,
    sessions: HashMap<String, Uuid>,
    tasks: HashMap<Uuid, Task>,
}

pub type Db = Arc<RwLock<Store>>;

type Rejection = (StatusCode, Json<Value>);

fn reject(status: StatusCode, detail: &str) -> Rejection {
    (status, Json(json!({ "detail": detail })))
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::default()));
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/me", get(me))
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route("/api/tasks/{id}", get(get_task).put(update_task).delete(delete_task))
        .route("/api/tasks/{id}/complete", patch(set_completion))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "Task API is running" }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

async fn register(
    State(db): State<Db>,
    Json(input): Json<Credentials>,
) -> Result<(StatusCode, Json<UserResponse>), Rejection> {
    let mut store = db.write().await;
    if store.accounts.contains_key(&input.email) {
        return Err(reject(StatusCode::CONFLICT, "Email already registered"));
    }
    if input.password.chars().filter(char::is_ascii_digit).count() < 8 {
        return Err(reject(
            StatusCode::BAD_REQUEST,
            "Password must contain at least 8 digits",
        ));
    }

    let user = UserResponse {
        id: Uuid::new_v4(),
        email: input.email.clone(),
        created_at: now(),
    };
    store.accounts.insert(
        input.email,
        Account {
            user: user.clone(),
            password: input.password,
        },
    );
    tracing::info!(user_id = %user.id, "registered user");
    Ok((StatusCode::CREATED, Json(user)))
}

async fn login(
    State(db): State<Db>,
    Json(input): Json<Credentials>,
) -> Result<Json<Token>, Rejection> {
    let mut store = db.write().await;
    let user = match store.accounts.get(&input.email) {
        Some(account) if account.password == input.password => account.user.clone(),
        _ => {
            return Err(reject(
                StatusCode::UNAUTHORIZED,
                "Incorrect email or password",
            ))
        }
    };

    let access_token = Uuid::new_v4().to_string();
    store.sessions.insert(access_token.clone(), user.id);
    Ok(Json(Token {
        access_token,
        token_type: "bearer".to_string(),
        user,
    }))
}

/// Resolve the bearer token in `headers` to a user id.
fn authenticate(store: &Store, headers: &HeaderMap) -> Result<Uuid, Rejection> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .and_then(|token| store.sessions.get(token.trim()).copied())
        .ok_or_else(|| reject(StatusCode::UNAUTHORIZED, "Could not validate credentials"))
}

async fn me(State(db): State<Db>, headers: HeaderMap) -> Result<Json<UserResponse>, Rejection> {
    let store = db.read().await;
    let user_id = authenticate(&store, &headers)?;
    store
        .accounts
        .values()
        .find(|a| a.user.id == user_id)
        .map(|a| Json(a.user.clone()))
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, "User not found"))
}

/// Look up a task owned by `user_id`.
fn owned_task<'a>(store: &'a mut Store, id: Uuid, user_id: Uuid) -> Result<&'a mut Task, Rejection> {
    let task = store
        .tasks
        .get_mut(&id)
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, "Task not found"))?;
    if task.user_id != user_id {
        return Err(reject(StatusCode::FORBIDDEN, "Not authorized to access this task"));
    }
    Ok(task)
}

fn apply_completion(task: &mut Task, completed: bool) {
    if completed && !task.completed {
        task.completed_at = Some(now());
    } else if !completed {
        task.completed_at = None;
    }
    task.completed = completed;
}

async fn list_tasks(State(db): State<Db>, headers: HeaderMap) -> Result<Json<Vec<Task>>, Rejection> {
    let store = db.read().await;
    let user_id = authenticate(&store, &headers)?;
    let mut tasks: Vec<Task> = store
        .tasks
        .values()
        .filter(|t| t.user_id == user_id)
        .cloned()
        .collect();
    tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    Ok(Json(tasks))
}

async fn create_task(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<CreateTask>,
) -> Result<(StatusCode, Json<Task>), Rejection> {
    let mut store = db.write().await;
    let user_id = authenticate(&store, &headers)?;
    let created_at = now();
    let task = Task {
        id: Uuid::new_v4(),
        user_id,
        title: input.title,
        description: input.description,
        completed: input.completed,
        completed_at: input.completed.then(|| created_at.clone()),
        updated_at: created_at.clone(),
        created_at,
    };
    store.tasks.insert(task.id, task.clone());
    Ok((StatusCode::CREATED, Json(task)))
}

async fn get_task(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Task>, Rejection> {
    let mut store = db.write().await;
    let user_id = authenticate(&store, &headers)?;
    owned_task(&mut store, id, user_id).map(|t| Json(t.clone()))
}

async fn update_task(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateTask>,
) -> Result<Json<Task>, Rejection> {
    let mut store = db.write().await;
    let user_id = authenticate(&store, &headers)?;
    let task = owned_task(&mut store, id, user_id)?;
    if let Some(title) = input.title {
        task.title = title;
    }
    if let Some(description) = input.description {
        task.description = Some(description);
    }
    if let Some(completed) = input.completed {
        apply_completion(task, completed);
    }
    task.updated_at = now();
    Ok(Json(task.clone()))
}

async fn delete_task(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, Rejection> {
    let mut store = db.write().await;
    let user_id = authenticate(&store, &headers)?;
    owned_task(&mut store, id, user_id)?;
    store.tasks.remove(&id);
    Ok(StatusCode::NO_CONTENT)
}

async fn set_completion(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(input): Json<TaskCompletion>,
) -> Result<Json<Task>, Rejection> {
    let mut store = db.write().await;
    let user_id = authenticate(&store, &headers)?;
    let task = owned_task(&mut store, id, user_id)?;
    apply_completion(task, input.completed);
    task.updated_at = now();
    Ok(Json(task.clone()))
}
