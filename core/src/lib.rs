//! Async API client core for the task service.
//!
//! # Overview
//! Finds a reachable backend among several candidate base URLs, runs JSON
//! requests against it with bounded retries and per-attempt deadlines, and
//! exposes the auth and task endpoints on top.
//!
//! # Design
//! - `BackendClient` owns the candidate list and the one cached endpoint;
//!   discovery, retry and fallback all live there.
//! - `Transport` is the only I/O seam. `ReqwestTransport` is the real one;
//!   tests script an in-memory transport under paused tokio time.
//! - Services split each call into `build_*` / `parse_*` functions around
//!   `BackendClient::execute`, so request shapes and error extraction stay
//!   pure and testable.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod auth;
pub mod backend;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod response;
pub mod tasks;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use auth::AuthService;
pub use backend::BackendClient;
pub use client::TaskDeskClient;
pub use config::ClientConfig;
pub use error::{ApiError, ConfigError, ErrorKind};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use tasks::TaskService;
pub use transport::{ReqwestTransport, Transport, TransportError};
pub use types::{CreateTask, Credentials, Task, TaskCompletion, Token, UpdateTask, UserLogin, UserRegister, UserResponse};
