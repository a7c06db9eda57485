use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{canvas_client, CurrentUser};
use crate::core::state::AppState;
use crate::repositories;
use crate::schemas::canvas::{CredentialsStatus, CredentialsUpdate, ProxyRequest};
use crate::services::canvas_proxy;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/proxy", post(proxy))
        .route("/credentials", get(credentials_status).put(store_credentials))
}

async fn proxy(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<ProxyRequest>,
) -> Result<Response, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let client = canvas_client(&state, &user).await?;
    let response = canvas_proxy::forward(
        &client,
        &payload.endpoint,
        payload.method.as_deref(),
        payload.data.as_ref(),
    )
    .await?;

    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
    Ok((status, Json(response.body)).into_response())
}

async fn credentials_status(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<CredentialsStatus>, ApiError> {
    let summary = repositories::canvas_credentials::summary_for_user(state.db(), &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load Canvas credentials"))?;

    Ok(Json(CredentialsStatus::from_summary(summary)))
}

async fn store_credentials(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<CredentialsUpdate>,
) -> Result<Json<CredentialsStatus>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let key = &state.settings().credentials().encryption_key;
    if key.is_empty() {
        return Err(ApiError::internal(
            "CREDENTIALS_ENCRYPTION_KEY is not set",
            "Canvas credential storage is not configured",
        ));
    }

    // Reject URLs the client could never connect to before persisting them.
    state
        .canvas()
        .connect(&payload.canvas_url, &payload.canvas_token)
        .map_err(|err| ApiError::BadRequest(err.to_string()))?;

    let canvas_url = payload.canvas_url.trim().trim_end_matches('/').to_string();
    let summary = repositories::canvas_credentials::upsert(
        state.db(),
        &user.id,
        &canvas_url,
        payload.canvas_token.trim(),
        key,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to store Canvas credentials"))?;

    tracing::info!(user_id = %user.id, canvas_url = %canvas_url, "Canvas credentials stored");
    Ok(Json(CredentialsStatus::from_summary(Some(summary))))
}
