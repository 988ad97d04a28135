use axum::{extract::State, http::HeaderMap, Extension, Json};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::auth::{extract_bearer_token, AuthUser};
use crate::error::ApiError;

/// GET /auth/user - The user behind the bearer token
pub async fn user(Extension(user): Extension<AuthUser>) -> Json<AuthUser> {
    Json(user)
}

/// POST /auth/logout - Revoke the provider session for this token
pub async fn logout(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let token = extract_bearer_token(&headers).map_err(|e| ApiError::unauthorized(e.to_string()))?;

    state.auth.sign_out(token).await.map_err(|e| {
        tracing::error!("Sign out failed for user {}: {}", user.id, e);
        ApiError::internal(e)
    })?;

    tracing::info!("User {} signed out", user.id);
    Ok(Json(json!({ "success": true })))
}
