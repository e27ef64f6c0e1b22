//! The network seam between the resilient client and the wire.
//!
//! # Design
//! A `Transport` performs exactly one round trip and reports how it failed.
//! Retry, fallback and deadlines live in `BackendClient`, which makes the
//! policy testable against a scripted in-memory transport and keeps the
//! reqwest-specific error taxonomy in this one file.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Why a single round trip produced no response.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The deadline fired before a response arrived.
    #[error("request timed out")]
    Timeout,

    /// Connection refused or reset, DNS failure.
    #[error("network error: {0}")]
    Network(String),

    /// The request could not be built or sent at all (e.g. malformed URL).
    #[error("invalid request: {0}")]
    Invalid(String),
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` to `base_url` joined with `request.path`.
    async fn send(&self, base_url: &str, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, base_url: &str, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(base_url, request).await
    }
}

/// Production transport backed by a shared `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, base_url: &str, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = format!("{base_url}{}", request.path);
        let mut builder = self.client.request(to_reqwest_method(request.method), url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        // The server has answered once headers arrive; a broken body must
        // not turn into a resend.
        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => {
                warn!(url = %base_url, path = %request.path, status, error = %err, "failed to read response body");
                String::new()
            }
        };

        Ok(HttpResponse { status, headers, body })
    }
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_builder() {
        TransportError::Invalid(err.to_string())
    } else {
        TransportError::Network(err.to_string())
    }
}
