//! Device-scoped session validation.
//!
//! Three gates run in order and the first failure wins: the `X-Device-ID` header must
//! be present, the bearer token must be accepted by the auth provider, and the
//! backend must not have invalidated the session for that device.

use axum::http::{HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::auth::{extract_bearer_token, AuthProvider, AuthUser};
use crate::database::Backend;
use crate::error::ApiError;

pub const DEVICE_ID_HEADER: &str = "x-device-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionErrorCode {
    MissingDeviceId,
    InvalidAuth,
    SessionInvalidated,
    ValidationError,
}

impl SessionErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionErrorCode::MissingDeviceId => "MISSING_DEVICE_ID",
            SessionErrorCode::InvalidAuth => "INVALID_AUTH",
            SessionErrorCode::SessionInvalidated => "SESSION_INVALIDATED",
            SessionErrorCode::ValidationError => "VALIDATION_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            SessionErrorCode::MissingDeviceId => StatusCode::BAD_REQUEST,
            SessionErrorCode::InvalidAuth => StatusCode::UNAUTHORIZED,
            SessionErrorCode::SessionInvalidated => StatusCode::UNAUTHORIZED,
            SessionErrorCode::ValidationError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionError {
    pub code: SessionErrorCode,
    pub message: String,
}

impl SessionError {
    pub fn new(code: SessionErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for SessionError {}

/// A request that passed every gate.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidSession {
    pub user: AuthUser,
    pub device_id: String,
}

impl ValidSession {
    pub fn user_id(&self) -> &str {
        &self.user.id
    }
}

/// Read the device id header, treating blank values as absent.
pub fn device_id_from_headers(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(DEVICE_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

pub async fn validate_session(
    auth: &dyn AuthProvider,
    backend: &dyn Backend,
    headers: &HeaderMap,
) -> Result<ValidSession, SessionError> {
    let device_id = device_id_from_headers(headers).ok_or_else(|| {
        SessionError::new(SessionErrorCode::MissingDeviceId, "Device ID header is required")
    })?;

    let token = extract_bearer_token(headers)
        .map_err(|e| SessionError::new(SessionErrorCode::InvalidAuth, e.to_string()))?;

    let user = auth.get_user(token).await.map_err(|e| {
        tracing::warn!("Session rejected for device {}: {}", device_id, e);
        SessionError::new(SessionErrorCode::InvalidAuth, "Invalid or expired session")
    })?;

    match backend.is_session_invalidated(&user.id, device_id).await {
        Ok(false) => Ok(ValidSession { user, device_id: device_id.to_string() }),
        Ok(true) => {
            tracing::info!("Session for user {} on device {} has been invalidated", user.id, device_id);
            Err(SessionError::new(
                SessionErrorCode::SessionInvalidated,
                "Session has been invalidated. Please sign in again.",
            ))
        }
        Err(e) => {
            tracing::error!("Session invalidation check failed: {}", e);
            Err(SessionError::new(
                SessionErrorCode::ValidationError,
                "Failed to validate session",
            ))
        }
    }
}

/// Like [`validate_session`], but yields an [`ApiError`] ready to be returned.
pub async fn require_valid_session(
    auth: &dyn AuthProvider,
    backend: &dyn Backend,
    headers: &HeaderMap,
) -> Result<ValidSession, ApiError> {
    validate_session(auth, backend, headers).await.map_err(ApiError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Claims, JwtAuth};
    use crate::database::MemoryBackend;
    use axum::http::HeaderValue;
    use chrono::Duration;

    fn headers(token: Option<&str>, device: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(token) = token {
            headers.insert(
                "authorization",
                HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
            );
        }
        if let Some(device) = device {
            headers.insert(DEVICE_ID_HEADER, HeaderValue::from_str(device).unwrap());
        }
        headers
    }

    fn token(auth: &JwtAuth, user: &str) -> String {
        auth.sign(&Claims::for_user(user, None, Duration::hours(1))).unwrap()
    }

    #[tokio::test]
    async fn missing_device_id_is_checked_first() {
        let auth = JwtAuth::new("secret");
        let backend = MemoryBackend::new();

        let err = validate_session(&auth, &backend, &headers(None, None)).await.unwrap_err();
        assert_eq!(err.code, SessionErrorCode::MissingDeviceId);
        assert_eq!(err.code.status(), StatusCode::BAD_REQUEST);

        let err = validate_session(&auth, &backend, &headers(None, Some("  "))).await.unwrap_err();
        assert_eq!(err.code, SessionErrorCode::MissingDeviceId);
    }

    #[tokio::test]
    async fn bad_token_is_invalid_auth() {
        let auth = JwtAuth::new("secret");
        let backend = MemoryBackend::new();

        let err = validate_session(&auth, &backend, &headers(Some("garbage"), Some("d1")))
            .await
            .unwrap_err();
        assert_eq!(err.code, SessionErrorCode::InvalidAuth);
        assert_eq!(err.code.status(), StatusCode::UNAUTHORIZED);

        let err = validate_session(&auth, &backend, &headers(None, Some("d1"))).await.unwrap_err();
        assert_eq!(err.code, SessionErrorCode::InvalidAuth);
    }

    #[tokio::test]
    async fn invalidated_device_is_rejected() {
        let auth = JwtAuth::new("secret");
        let backend = MemoryBackend::new();
        backend.invalidate_session("user-1", "d1").await;
        let token = token(&auth, "user-1");

        let err = validate_session(&auth, &backend, &headers(Some(&token), Some("d1")))
            .await
            .unwrap_err();
        assert_eq!(err.code, SessionErrorCode::SessionInvalidated);

        let session = validate_session(&auth, &backend, &headers(Some(&token), Some("d2")))
            .await
            .unwrap();
        assert_eq!(session.user_id(), "user-1");
        assert_eq!(session.device_id, "d2");
    }

    #[tokio::test]
    async fn rpc_failure_fails_closed() {
        let auth = JwtAuth::new("secret");
        let backend = MemoryBackend::new();
        backend.fail_rpc("is_session_invalidated").await;
        let token = token(&auth, "user-1");

        let err = require_valid_session(&auth, &backend, &headers(Some(&token), Some("d1")))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }
}
