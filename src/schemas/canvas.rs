use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::core::time;
use crate::db::models::CredentialsSummary;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ProxyRequest {
    #[validate(length(min = 1, message = "endpoint must not be empty"))]
    pub(crate) endpoint: String,
    #[serde(default)]
    pub(crate) method: Option<String>,
    #[serde(default)]
    pub(crate) data: Option<Value>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct CredentialsUpdate {
    #[serde(alias = "canvasUrl")]
    #[validate(length(min = 1, max = 2048, message = "canvas_url must not be empty"))]
    pub(crate) canvas_url: String,
    #[serde(alias = "canvasToken")]
    #[validate(length(min = 1, max = 4096, message = "canvas_token must not be empty"))]
    pub(crate) canvas_token: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct CredentialsStatus {
    pub(crate) configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) canvas_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) updated_at: Option<String>,
}

impl CredentialsStatus {
    pub(crate) fn from_summary(summary: Option<CredentialsSummary>) -> Self {
        match summary {
            Some(summary) => Self {
                configured: true,
                canvas_url: Some(summary.canvas_url),
                updated_at: Some(time::format_offset(summary.updated_at)),
            },
            None => Self { configured: false, canvas_url: None, updated_at: None },
        }
    }
}
