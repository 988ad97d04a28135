use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};

use crate::app::AppState;
use crate::auth::extract_bearer_token;
use crate::error::ApiError;
use crate::session::require_valid_session;

/// Full session gate for resource routes. Inserts the [`crate::session::ValidSession`]
/// into request extensions.
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let session =
        require_valid_session(state.auth.as_ref(), state.backend.as_ref(), request.headers()).await?;
    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}

/// Bearer validation only, for routes that must work before a device is registered.
/// Inserts the [`crate::auth::AuthUser`].
pub async fn require_bearer(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(request.headers())
        .map_err(|e| ApiError::unauthorized(e.to_string()))?;

    let user = state.auth.get_user(token).await.map_err(|e| {
        tracing::warn!("Bearer token rejected: {}", e);
        ApiError::unauthorized("Invalid or expired token")
    })?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Only the service-role key may pass.
pub async fn require_service_role(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(request.headers())
        .map_err(|e| ApiError::unauthorized(e.to_string()))?;

    if !keys_match(token, &state.config.backend.service_role_key) {
        tracing::warn!("Rejected service-role request with a non-service key");
        return Err(ApiError::forbidden("Service role key required"));
    }

    Ok(next.run(request).await)
}

/// Constant-time comparison over digests, so neither length nor content leaks timing.
fn keys_match(provided: &str, expected: &str) -> bool {
    if provided.is_empty() || expected.is_empty() {
        return false;
    }

    let provided = Sha256::digest(provided.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());

    let mut diff = 0u8;
    for (a, b) in provided.iter().zip(expected.iter()) {
        diff |= a ^ b;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_match_requires_exact_key() {
        assert!(keys_match("service-role-key", "service-role-key"));
        assert!(!keys_match("service-role-kez", "service-role-key"));
        assert!(!keys_match("service-role", "service-role-key"));
        assert!(!keys_match("", ""));
    }
}
