use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::services::canvas::{CanvasError, CanvasFailure};
use crate::services::canvas_proxy::ProxyError;
use crate::services::quiz_answers::AnswersError;
use crate::services::quiz_grading::GradingError;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    status: u16,
    detail: String,
}

#[derive(Debug)]
pub(crate) enum ApiError {
    Unauthorized(&'static str),
    /// Canvas rejected the stored token; the caller's own session is fine.
    CanvasUnauthorized(&'static str),
    Forbidden(&'static str),
    BadRequest(String),
    NotFound(String),
    BadGateway(String),
    Internal(String),
}

impl ApiError {
    /// Log the underlying error with context and return an `Internal` variant.
    pub(crate) fn internal(err: impl std::fmt::Display, context: &str) -> Self {
        tracing::error!(error = %err, "{context}");
        Self::Internal(context.to_string())
    }

    /// Map an upstream Canvas failure to the status the caller should see.
    pub(crate) fn from_canvas(err: &CanvasError) -> Self {
        let failure = err.classify();
        let message = failure.user_message();
        match failure {
            CanvasFailure::InvalidCredentials => ApiError::CanvasUnauthorized(message),
            CanvasFailure::Forbidden => ApiError::Forbidden(message),
            CanvasFailure::NotFound => ApiError::NotFound(message.to_string()),
            CanvasFailure::InvalidPayload => {
                ApiError::BadRequest(format!("{message}: {}", err.upstream_message()))
            }
            CanvasFailure::Upstream => {
                tracing::warn!(error = %err, "Canvas upstream failure");
                ApiError::BadGateway(format!("{message}: {}", err.upstream_message()))
            }
        }
    }
}

impl From<AnswersError> for ApiError {
    fn from(err: AnswersError) -> Self {
        let detail = err.to_string();
        match err {
            AnswersError::Detection(detection) => ApiError::from_canvas(detection.canvas()),
            AnswersError::MissingUserId => ApiError::BadRequest(detail),
            AnswersError::Submission { source, .. } => ApiError::from_canvas(&source),
        }
    }
}

impl From<GradingError> for ApiError {
    fn from(err: GradingError) -> Self {
        let detail = err.to_string();
        match err {
            GradingError::Detection(detection) => ApiError::from_canvas(detection.canvas()),
            GradingError::MissingUserId | GradingError::MissingQuestionId => ApiError::BadRequest(detail),
            GradingError::MissingAttempt(_) => ApiError::BadGateway(detail),
            GradingError::Canvas { source, .. } => ApiError::from_canvas(&source),
        }
    }
}

impl From<ProxyError> for ApiError {
    fn from(err: ProxyError) -> Self {
        let detail = err.to_string();
        match err {
            ProxyError::InvalidEndpoint | ProxyError::UnsupportedMethod(_) => ApiError::BadRequest(detail),
            ProxyError::Canvas(source) => ApiError::from_canvas(&source),
        }
    }
}

fn render(status: StatusCode, detail: String) -> Response {
    (status, Json(ErrorResponse { status: status.as_u16(), detail })).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(message) => {
                let mut response = render(StatusCode::UNAUTHORIZED, message.to_string());
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
                response
            }
            ApiError::CanvasUnauthorized(message) => {
                render(StatusCode::UNAUTHORIZED, message.to_string())
            }
            ApiError::Forbidden(message) => render(StatusCode::FORBIDDEN, message.to_string()),
            ApiError::BadRequest(message) => render(StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(message) => render(StatusCode::NOT_FOUND, message),
            ApiError::BadGateway(message) => render(StatusCode::BAD_GATEWAY, message),
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "Internal server error");
                render(StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canvas_status(status: u16) -> CanvasError {
        CanvasError::Status { status, path: "/api/v1/x".to_string(), message: "boom".to_string() }
    }

    #[test]
    fn canvas_statuses_map_to_client_statuses() {
        let cases = [
            (401, StatusCode::UNAUTHORIZED),
            (403, StatusCode::FORBIDDEN),
            (404, StatusCode::NOT_FOUND),
            (400, StatusCode::BAD_REQUEST),
            (422, StatusCode::BAD_REQUEST),
            (500, StatusCode::BAD_GATEWAY),
        ];
        for (upstream, expected) in cases {
            let response = ApiError::from_canvas(&canvas_status(upstream)).into_response();
            assert_eq!(response.status(), expected, "upstream {upstream}");
        }
    }

    #[test]
    fn canvas_token_rejection_has_no_bearer_challenge() {
        let response = ApiError::from_canvas(&canvas_status(401)).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());
    }

    #[test]
    fn missing_user_id_is_a_bad_request() {
        let response = ApiError::from(GradingError::MissingUserId).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn unauthorized_carries_bearer_challenge() {
        let response = ApiError::Unauthorized("nope").into_response();
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).and_then(|v| v.to_str().ok()),
            Some("Bearer")
        );
    }
}
