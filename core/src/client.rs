//! One backend, two services.
//!
//! # Design
//! `TaskDeskClient` owns the `BackendClient` behind an `Arc` and hands out
//! `AuthService` and `TaskService` views over it, so a login that discovers
//! the fallback backend also routes the following task calls there. Create
//! one instance per logical session; independent instances never share the
//! cached endpoint.

use std::sync::Arc;

use crate::auth::AuthService;
use crate::backend::BackendClient;
use crate::config::ClientConfig;
use crate::tasks::TaskService;
use crate::transport::{ReqwestTransport, Transport};

pub struct TaskDeskClient<T: Transport = ReqwestTransport> {
    backend: Arc<BackendClient<T>>,
    auth: AuthService<T>,
    tasks: TaskService<T>,
}

impl TaskDeskClient {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_transport(ReqwestTransport::new(), config)
    }
}

impl<T: Transport> TaskDeskClient<T> {
    pub fn with_transport(transport: T, config: ClientConfig) -> Self {
        let backend = Arc::new(BackendClient::new(transport, config));
        Self {
            auth: AuthService::new(Arc::clone(&backend)),
            tasks: TaskService::new(Arc::clone(&backend)),
            backend,
        }
    }

    pub fn auth(&self) -> &AuthService<T> {
        &self.auth
    }

    pub fn tasks(&self) -> &TaskService<T> {
        &self.tasks
    }

    pub fn backend(&self) -> &BackendClient<T> {
        &self.backend
    }
}
