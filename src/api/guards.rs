use async_trait::async_trait;
use axum::extract::{FromRequestParts, State};
use axum::http::{header, request::Parts};

use crate::api::errors::ApiError;
use crate::core::{security, state::AppState};
use crate::repositories;
use crate::services::canvas::HttpCanvasClient;

/// Identity resolved from the bearer token issued by the auth backend.
#[derive(Debug, Clone)]
pub(crate) struct AuthUser {
    pub(crate) id: String,
    pub(crate) email: Option<String>,
}

pub(crate) struct CurrentUser(pub(crate) AuthUser);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let State(app_state) = State::<AppState>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to access application state"))?;

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(ApiError::Unauthorized("Invalid authentication credentials"))?;

        let claims = security::verify_token(token, app_state.settings()).map_err(|err| {
            tracing::debug!(error = %err, "Rejected bearer token");
            ApiError::Unauthorized("Invalid authentication credentials")
        })?;

        Ok(CurrentUser(AuthUser { id: claims.sub, email: claims.email }))
    }
}

/// Build a Canvas client from the caller's stored credentials.
pub(crate) async fn canvas_client(
    state: &AppState,
    user: &AuthUser,
) -> Result<HttpCanvasClient, ApiError> {
    let key = &state.settings().credentials().encryption_key;
    if key.is_empty() {
        return Err(ApiError::internal(
            "CREDENTIALS_ENCRYPTION_KEY is not set",
            "Canvas credential storage is not configured",
        ));
    }

    let credentials = repositories::canvas_credentials::find_for_user(state.db(), &user.id, key)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load Canvas credentials"))?
        .ok_or_else(|| ApiError::BadRequest("Canvas credentials not configured".to_string()))?;

    state.canvas().connect(&credentials.canvas_url, &credentials.canvas_token).map_err(|err| {
        tracing::warn!(user_id = %user.id, error = %err, "Stored Canvas URL is unusable");
        ApiError::BadRequest("Stored Canvas URL is invalid".to_string())
    })
}
