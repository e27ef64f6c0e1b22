//! Task CRUD for the signed-in user.
//!
//! Same split as `auth`: `build_*` produces the relative request, `parse_*`
//! checks status and decodes, `TaskService` runs them through the resilient
//! client. Every call carries the bearer token from `AuthService::login`.

use std::sync::Arc;

use uuid::Uuid;

use crate::backend::BackendClient;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::response::{check_success, parse_json, to_json};
use crate::transport::{ReqwestTransport, Transport};
use crate::types::{CreateTask, Task, TaskCompletion, UpdateTask};

pub const TASKS_PATH: &str = "/api/tasks";

fn task_path(id: Uuid) -> String {
    format!("{TASKS_PATH}/{id}")
}

pub fn build_list_tasks(token: &str) -> HttpRequest {
    HttpRequest::new(HttpMethod::Get, TASKS_PATH).with_bearer(token)
}

pub fn build_get_task(token: &str, id: Uuid) -> HttpRequest {
    HttpRequest::new(HttpMethod::Get, task_path(id)).with_bearer(token)
}

pub fn build_create_task(token: &str, input: &CreateTask) -> Result<HttpRequest, ApiError> {
    Ok(HttpRequest::new(HttpMethod::Post, TASKS_PATH)
        .with_bearer(token)
        .with_json_body(to_json(input)?))
}

pub fn build_update_task(token: &str, id: Uuid, input: &UpdateTask) -> Result<HttpRequest, ApiError> {
    Ok(HttpRequest::new(HttpMethod::Put, task_path(id))
        .with_bearer(token)
        .with_json_body(to_json(input)?))
}

pub fn build_delete_task(token: &str, id: Uuid) -> HttpRequest {
    HttpRequest::new(HttpMethod::Delete, task_path(id)).with_bearer(token)
}

pub fn build_set_completion(token: &str, id: Uuid, completed: bool) -> Result<HttpRequest, ApiError> {
    Ok(HttpRequest::new(HttpMethod::Patch, format!("{}/complete", task_path(id)))
        .with_bearer(token)
        .with_json_body(to_json(&TaskCompletion { completed })?))
}

pub fn parse_list_tasks(response: &HttpResponse) -> Result<Vec<Task>, ApiError> {
    parse_json(response, "list tasks")
}

pub fn parse_task(response: &HttpResponse, operation: &str) -> Result<Task, ApiError> {
    parse_json(response, operation)
}

/// Any 2xx; the body (204 or a confirmation message) is ignored.
pub fn parse_delete_task(response: &HttpResponse) -> Result<(), ApiError> {
    check_success(response, "delete task")
}

pub struct TaskService<T: Transport = ReqwestTransport> {
    backend: Arc<BackendClient<T>>,
}

impl<T: Transport> Clone for TaskService<T> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<T: Transport> TaskService<T> {
    pub fn new(backend: Arc<BackendClient<T>>) -> Self {
        Self { backend }
    }

    pub async fn list_tasks(&self, token: &str) -> Result<Vec<Task>, ApiError> {
        let response = self.backend.execute(&build_list_tasks(token)).await?;
        parse_list_tasks(&response)
    }

    pub async fn get_task(&self, token: &str, id: Uuid) -> Result<Task, ApiError> {
        let response = self.backend.execute(&build_get_task(token, id)).await?;
        parse_task(&response, "get task")
    }

    pub async fn create_task(&self, token: &str, input: &CreateTask) -> Result<Task, ApiError> {
        let response = self.backend.execute(&build_create_task(token, input)?).await?;
        parse_task(&response, "create task")
    }

    pub async fn update_task(&self, token: &str, id: Uuid, input: &UpdateTask) -> Result<Task, ApiError> {
        let response = self.backend.execute(&build_update_task(token, id, input)?).await?;
        parse_task(&response, "update task")
    }

    pub async fn delete_task(&self, token: &str, id: Uuid) -> Result<(), ApiError> {
        let response = self.backend.execute(&build_delete_task(token, id)).await?;
        parse_delete_task(&response)
    }

    pub async fn set_completion(&self, token: &str, id: Uuid, completed: bool) -> Result<Task, ApiError> {
        let response = self
            .backend
            .execute(&build_set_completion(token, id, completed)?)
            .await?;
        parse_task(&response, "update task completion")
    }
}
