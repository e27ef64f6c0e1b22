//! Error types for the task API client.
//!
//! # Design
//! Callers render different guidance for "the server could not be reached",
//! "the server is too slow" and "the server said no", so those are separate
//! variants and `ApiError::kind` collapses them into the four classes the UI
//! switches on. No transport error crosses the service boundary as-is: the
//! resilient client converts the last `TransportError` it saw into one of
//! these variants together with the endpoint it was talking to.

use thiserror::Error;

/// Coarse error class for presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unreachable,
    Timeout,
    Application,
    Unexpected,
}

/// Errors returned by `BackendClient`, `AuthService` and `TaskService`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Every candidate failed at the network level; `endpoint` is the last
    /// URL that was tried.
    #[error(
        "Failed to connect to the server at {endpoint}. Please make sure the backend is running and accessible. ({cause})"
    )]
    Unreachable { endpoint: String, cause: String },

    /// The last attempt hit its deadline before a response arrived.
    #[error("Request to {endpoint} timed out. The server may be busy or not responding.")]
    Timeout { endpoint: String },

    /// The server answered with a non-2xx status.
    #[error("{message}")]
    Application { status: u16, message: String },

    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),

    /// There were no candidates to try at all.
    #[error("No backend available")]
    NoBackendAvailable,
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Unreachable { .. } | ApiError::NoBackendAvailable => ErrorKind::Unreachable,
            ApiError::Timeout { .. } => ErrorKind::Timeout,
            ApiError::Application { .. } => ErrorKind::Application,
            ApiError::Unexpected(_) => ErrorKind::Unexpected,
        }
    }

    /// HTTP status for `Application` errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Application { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Invalid client configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("at least one candidate base URL is required")]
    NoCandidates,

    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn application_error_displays_bare_message() {
        let err = ApiError::Application {
            status: 400,
            message: "invalid credentials".to_string(),
        };
        assert_eq!(err.to_string(), "invalid credentials");
        assert_eq!(err.kind(), ErrorKind::Application);
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn unreachable_names_endpoint() {
        let err = ApiError::Unreachable {
            endpoint: "http://127.0.0.1:8000/api/auth/login".to_string(),
            cause: "connection refused".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("Failed to connect to the server"));
        assert!(msg.contains("http://127.0.0.1:8000/api/auth/login"));
        assert_eq!(err.kind(), ErrorKind::Unreachable);
    }

    #[test]
    fn no_backend_is_unreachable_class() {
        assert_eq!(ApiError::NoBackendAvailable.kind(), ErrorKind::Unreachable);
        assert_eq!(ApiError::NoBackendAvailable.status(), None);
    }

    #[test]
    fn timeout_is_distinct_from_unreachable() {
        let err = ApiError::Timeout {
            endpoint: "http://localhost:8000/api/auth/me".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(err.to_string().contains("timed out"));
    }
}
