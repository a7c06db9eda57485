//! Narrow port over the Canvas REST API.
//!
//! Everything that talks to Canvas goes through [`CanvasApi`], so the answer
//! reconciliation and grading logic can run against recorded fixtures.

mod client;
pub(crate) mod endpoints;

use async_trait::async_trait;
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub(crate) use client::{CanvasConnector, HttpCanvasClient};

#[derive(Debug, Clone, Error)]
pub(crate) enum CanvasError {
    #[error("Canvas request to {path} failed: {message}")]
    Transport { path: String, message: String },
    #[error("Canvas returned {status} for {path}: {message}")]
    Status { status: u16, path: String, message: String },
    #[error("Canvas returned an unreadable body for {path}: {message}")]
    Decode { path: String, message: String },
    #[error("invalid Canvas endpoint: {0}")]
    InvalidEndpoint(String),
}

/// User-facing classification of an upstream failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CanvasFailure {
    InvalidCredentials,
    Forbidden,
    NotFound,
    InvalidPayload,
    Upstream,
}

impl CanvasError {
    pub(crate) fn status(&self) -> Option<u16> {
        match self {
            CanvasError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn classify(&self) -> CanvasFailure {
        match self.status() {
            Some(401) => CanvasFailure::InvalidCredentials,
            Some(403) => CanvasFailure::Forbidden,
            Some(404) => CanvasFailure::NotFound,
            Some(400) | Some(422) => CanvasFailure::InvalidPayload,
            Some(_) => CanvasFailure::Upstream,
            None => match self {
                CanvasError::InvalidEndpoint(_) => CanvasFailure::InvalidPayload,
                _ => CanvasFailure::Upstream,
            },
        }
    }

    pub(crate) fn upstream_message(&self) -> &str {
        match self {
            CanvasError::Transport { message, .. }
            | CanvasError::Status { message, .. }
            | CanvasError::Decode { message, .. } => message,
            CanvasError::InvalidEndpoint(endpoint) => endpoint,
        }
    }
}

impl CanvasFailure {
    pub(crate) fn user_message(self) -> &'static str {
        match self {
            CanvasFailure::InvalidCredentials => "Canvas credentials are invalid or expired",
            CanvasFailure::Forbidden => "Canvas denied access to this resource",
            CanvasFailure::NotFound => "Quiz or submission not found in Canvas",
            CanvasFailure::InvalidPayload => "Canvas rejected the request payload",
            CanvasFailure::Upstream => "Canvas request failed",
        }
    }
}

/// Raw pass-through response: status plus JSON body (or the text body as a JSON string).
#[derive(Debug, Clone, Serialize)]
pub(crate) struct CanvasResponse {
    pub(crate) status: u16,
    pub(crate) body: Value,
}

#[async_trait]
pub(crate) trait CanvasApi: Send + Sync {
    /// GET a single JSON document. Non-2xx responses become [`CanvasError::Status`].
    async fn get_json(&self, path: &str) -> Result<Value, CanvasError>;

    /// GET a paginated collection, following `Link: rel="next"` headers.
    async fn get_all(&self, path: &str) -> Result<Vec<Value>, CanvasError>;

    async fn put_json(&self, path: &str, body: &Value) -> Result<Value, CanvasError>;

    /// Forward an arbitrary call without interpreting the status code.
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<CanvasResponse, CanvasError>;
}

/// Pull a human readable message out of a Canvas error body.
pub(crate) fn extract_error_message(payload: &Value) -> String {
    if let Some(errors) = payload.get("errors") {
        if let Some(items) = errors.as_array() {
            let joined = items
                .iter()
                .filter_map(|item| {
                    item.get("message").and_then(Value::as_str).or_else(|| item.as_str())
                })
                .collect::<Vec<_>>()
                .join("; ");
            if !joined.is_empty() {
                return joined;
            }
        }
        if let Some(object) = errors.as_object() {
            let joined = object
                .iter()
                .map(|(field, detail)| match detail {
                    Value::String(text) => format!("{field}: {text}"),
                    other => format!("{field}: {other}"),
                })
                .collect::<Vec<_>>()
                .join("; ");
            if !joined.is_empty() {
                return joined;
            }
        }
    }

    payload
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| payload.get("error").and_then(Value::as_str))
        .or_else(|| payload.as_str())
        .unwrap_or("unknown_error")
        .to_string()
}
