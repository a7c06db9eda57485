use reqwest::Method;
use serde_json::Value;
use thiserror::Error;

use crate::services::canvas::{CanvasApi, CanvasError, CanvasResponse};

#[derive(Debug, Error)]
pub(crate) enum ProxyError {
    #[error("endpoint must be a relative /api/v1/ path")]
    InvalidEndpoint,
    #[error("unsupported method: {0}")]
    UnsupportedMethod(String),
    #[error(transparent)]
    Canvas(#[from] CanvasError),
}

fn parse_method(raw: Option<&str>) -> Result<Method, ProxyError> {
    let raw = raw.map(str::trim).filter(|value| !value.is_empty()).unwrap_or("GET");
    match raw.to_ascii_uppercase().as_str() {
        "GET" => Ok(Method::GET),
        "POST" => Ok(Method::POST),
        "PUT" => Ok(Method::PUT),
        "PATCH" => Ok(Method::PATCH),
        "DELETE" => Ok(Method::DELETE),
        _ => Err(ProxyError::UnsupportedMethod(raw.to_string())),
    }
}

/// Forward a caller-specified call to Canvas and hand back whatever status and body it returned.
pub(crate) async fn forward(
    api: &dyn CanvasApi,
    endpoint: &str,
    method: Option<&str>,
    data: Option<&Value>,
) -> Result<CanvasResponse, ProxyError> {
    let endpoint = endpoint.trim();
    if !endpoint.starts_with("/api/v1/") {
        return Err(ProxyError::InvalidEndpoint);
    }
    let method = parse_method(method)?;
    let body = if method == Method::GET { None } else { data.filter(|value| !value.is_null()) };

    let response = api.send(method.clone(), endpoint, body).await?;
    tracing::debug!(method = %method, endpoint = %endpoint, status = response.status, "Canvas proxy call");
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FixtureCanvas;
    use serde_json::json;

    #[tokio::test]
    async fn forwards_status_and_body() {
        let canvas = FixtureCanvas::new()
            .with_json("/api/v1/courses/1/assignments", json!([{"id": 5}]))
            .with_status("/api/v1/courses/2/assignments", 401);

        let ok = forward(&canvas, "/api/v1/courses/1/assignments", None, None).await.expect("ok");
        assert_eq!(ok.status, 200);
        assert_eq!(ok.body, json!([{"id": 5}]));

        let denied = forward(&canvas, "/api/v1/courses/2/assignments", Some("get"), None)
            .await
            .expect("forwarded");
        assert_eq!(denied.status, 401);
    }

    #[tokio::test]
    async fn body_is_dropped_for_get() {
        let canvas = FixtureCanvas::new().with_json("/api/v1/users/self", json!({"id": 1}));
        forward(&canvas, "/api/v1/users/self", Some("GET"), Some(&json!({"x": 1})))
            .await
            .expect("ok");
        assert!(canvas.puts().is_empty());
    }

    #[tokio::test]
    async fn rejects_absolute_urls_and_unknown_methods() {
        let canvas = FixtureCanvas::new();
        assert!(matches!(
            forward(&canvas, "https://evil.test/api/v1/x", None, None).await,
            Err(ProxyError::InvalidEndpoint)
        ));
        assert!(matches!(
            forward(&canvas, "/api/v1/x", Some("TRACE"), None).await,
            Err(ProxyError::UnsupportedMethod(_))
        ));
        assert!(canvas.calls().is_empty());
    }
}
