//! Bearer-token authentication against the hosted auth provider.
//!
//! Handlers never talk to the provider directly; they go through an [`AuthProvider`]
//! held in the application state so every route shares one implementation.

pub mod jwt;
pub mod supabase;

use async_trait::async_trait;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use jwt::{Claims, JwtAuth};
pub use supabase::SupabaseAuth;

/// Authenticated caller, as reported by the auth provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingHeader,

    #[error("{0}")]
    InvalidHeader(String),

    #[error("Invalid or expired token: {0}")]
    InvalidToken(String),

    #[error("Auth provider error: {0}")]
    Provider(String),
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Resolve the user behind an access token, failing if the token is not live.
    async fn get_user(&self, token: &str) -> Result<AuthUser, AuthError>;

    /// Revoke the session behind an access token.
    async fn sign_out(&self, token: &str) -> Result<(), AuthError>;
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let auth_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(AuthError::MissingHeader)?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| AuthError::InvalidHeader("Invalid Authorization header format".to_string()))?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim()),
        Some(_) => Err(AuthError::InvalidHeader("Empty bearer token".to_string())),
        None => Err(AuthError::InvalidHeader(
            "Authorization header must use Bearer token format".to_string(),
        )),
    }
}
