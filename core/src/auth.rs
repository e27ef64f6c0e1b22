//! Register, login and current-user calls over the resilient client.
//!
//! # Design
//! Each operation is split into a `build_*` function producing a relative
//! `HttpRequest` and a `parse_*` function consuming the `HttpResponse`, so
//! request shapes and error extraction are testable without any I/O.
//! `AuthService` glues them to `BackendClient::execute`.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::backend::BackendClient;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::response::{parse_json, to_json};
use crate::transport::{ReqwestTransport, Transport};
use crate::types::{Credentials, Token, UserResponse};

pub const REGISTER_PATH: &str = "/api/auth/register";
pub const LOGIN_PATH: &str = "/api/auth/login";
pub const CURRENT_USER_PATH: &str = "/api/auth/me";
pub const HEALTH_PATH: &str = "/health";

pub fn build_register(credentials: &Credentials) -> Result<HttpRequest, ApiError> {
    Ok(HttpRequest::new(HttpMethod::Post, REGISTER_PATH).with_json_body(to_json(credentials)?))
}

pub fn build_login(credentials: &Credentials) -> Result<HttpRequest, ApiError> {
    Ok(HttpRequest::new(HttpMethod::Post, LOGIN_PATH).with_json_body(to_json(credentials)?))
}

pub fn build_current_user(token: &str) -> HttpRequest {
    HttpRequest::new(HttpMethod::Get, CURRENT_USER_PATH).with_bearer(token)
}

pub fn parse_register(response: &HttpResponse) -> Result<UserResponse, ApiError> {
    parse_json(response, "registration")
}

pub fn parse_login(response: &HttpResponse) -> Result<Token, ApiError> {
    parse_json(response, "login")
}

pub fn parse_current_user(response: &HttpResponse) -> Result<UserResponse, ApiError> {
    parse_json(response, "get current user")
}

pub struct AuthService<T: Transport = ReqwestTransport> {
    backend: Arc<BackendClient<T>>,
}

impl<T: Transport> Clone for AuthService<T> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<T: Transport> AuthService<T> {
    pub fn new(backend: Arc<BackendClient<T>>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<BackendClient<T>> {
        &self.backend
    }

    pub async fn register(&self, credentials: &Credentials) -> Result<UserResponse, ApiError> {
        let response = self.backend.execute(&build_register(credentials)?).await?;
        log_failure("registration", &response);
        parse_register(&response)
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<Token, ApiError> {
        let response = self.backend.execute(&build_login(credentials)?).await?;
        log_failure("login", &response);
        parse_login(&response)
    }

    pub async fn get_current_user(&self, token: &str) -> Result<UserResponse, ApiError> {
        let response = self.backend.execute(&build_current_user(token)).await?;
        log_failure("get current user", &response);
        parse_current_user(&response)
    }

    /// One bounded GET of `/health` on the resolved backend. Never errors.
    pub async fn test_connection(&self) -> bool {
        let url = self.backend.resolve_endpoint().await;
        let timeout = self.backend.config().health_timeout;
        match self.backend.probe(&url, HEALTH_PATH, timeout).await {
            Ok(resp) => {
                if !resp.is_success() {
                    warn!(url = %url, status = resp.status, "connection test failed");
                }
                resp.is_success()
            }
            Err(e) => {
                warn!(url = %url, error = %e, "connection test failed");
                false
            }
        }
    }
}

fn log_failure(operation: &str, response: &HttpResponse) {
    if !response.is_success() {
        debug!(operation, status = response.status, body = %response.body, "request rejected");
    }
}
