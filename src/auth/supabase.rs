use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use super::{AuthError, AuthProvider, AuthUser};

/// Validates tokens by asking the hosted auth service who they belong to.
pub struct SupabaseAuth {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

#[derive(Debug, Deserialize)]
struct RemoteUser {
    id: String,
    email: Option<String>,
    role: Option<String>,
}

impl SupabaseAuth {
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }
}

#[async_trait]
impl AuthProvider for SupabaseAuth {
    async fn get_user(&self, token: &str) -> Result<AuthUser, AuthError> {
        let response = self
            .http
            .get(self.endpoint("user"))
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AuthError::Provider(e.to_string()))?;

        match response.status() {
            status if status.is_success() => {
                let user: RemoteUser = response
                    .json()
                    .await
                    .map_err(|e| AuthError::Provider(format!("malformed user payload: {}", e)))?;
                Ok(AuthUser { id: user.id, email: user.email, role: user.role })
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(AuthError::InvalidToken("rejected by auth provider".to_string()))
            }
            status => Err(AuthError::Provider(format!("unexpected status {}", status))),
        }
    }

    async fn sign_out(&self, token: &str) -> Result<(), AuthError> {
        let response = self
            .http
            .post(self.endpoint("logout"))
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AuthError::Provider(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(AuthError::InvalidToken("rejected by auth provider".to_string()))
            }
            status => Err(AuthError::Provider(format!("unexpected status {}", status))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_strips_trailing_slash() {
        let auth = SupabaseAuth::new("https://project.supabase.co/", "anon");
        assert_eq!(auth.endpoint("user"), "https://project.supabase.co/auth/v1/user");
    }
}
