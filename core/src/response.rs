//! Status checks and body decoding shared by the auth and task services.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ApiError;
use crate::http::HttpResponse;

/// Human-readable message for a non-success response.
///
/// Prefers the JSON `detail` field (string as-is, anything else as compact
/// JSON), then a non-JSON body's text, then `"<operation> failed: HTTP <status>"`.
pub fn error_message(response: &HttpResponse, operation: &str) -> String {
    let body = response.body.trim();
    let detail = match serde_json::from_str::<serde_json::Value>(body) {
        Ok(json) => match json.get("detail") {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(serde_json::Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        },
        Err(_) => Some(body.to_string()),
    };

    detail
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| format!("{operation} failed: HTTP {}", response.status))
}

/// `Ok` for 2xx, otherwise an `Application` error carrying the extracted message.
pub fn check_success(response: &HttpResponse, operation: &str) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    Err(ApiError::Application {
        status: response.status,
        message: error_message(response, operation),
    })
}

pub(crate) fn parse_json<T: DeserializeOwned>(response: &HttpResponse, operation: &str) -> Result<T, ApiError> {
    check_success(response, operation)?;
    serde_json::from_str(&response.body)
        .map_err(|e| ApiError::Unexpected(format!("{operation}: malformed response body: {e}")))
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string(value).map_err(|e| ApiError::Unexpected(format!("could not encode request: {e}")))
}
