use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::{AuthError, AuthProvider, AuthUser};

/// Audience the auth provider stamps on user access tokens.
pub const AUTHENTICATED_AUDIENCE: &str = "authenticated";

/// Claims carried by auth provider access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Option<String>,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl Claims {
    pub fn for_user(user_id: impl Into<String>, email: Option<String>, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: Some(user_id.into()),
            aud: AUTHENTICATED_AUDIENCE.to_string(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            email,
            role: Some(AUTHENTICATED_AUDIENCE.to_string()),
            session_id: Some(uuid::Uuid::new_v4().to_string()),
        }
    }
}

/// Verifies HS256 access tokens locally with the project JWT secret.
pub struct JwtAuth {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtAuth {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[AUTHENTICATED_AUDIENCE]);
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AuthError::Provider(format!("failed to sign token: {}", e)))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }
}

#[async_trait]
impl AuthProvider for JwtAuth {
    async fn get_user(&self, token: &str) -> Result<AuthUser, AuthError> {
        let claims = self.verify(token)?;
        let id = claims
            .sub
            .filter(|sub| !sub.is_empty())
            .ok_or_else(|| AuthError::InvalidToken("token has no subject".to_string()))?;

        Ok(AuthUser { id, email: claims.email, role: claims.role })
    }

    async fn sign_out(&self, token: &str) -> Result<(), AuthError> {
        // Stateless tokens cannot be revoked here; they lapse at `exp`.
        self.verify(token).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn accepts_token_signed_with_same_secret() {
        let auth = JwtAuth::new("test-secret");
        let claims = Claims::for_user("user-1", Some("a@example.com".to_string()), Duration::hours(1));
        let token = auth.sign(&claims).unwrap();

        let user = auth.get_user(&token).await.unwrap();
        assert_eq!(user.id, "user-1");
        assert_eq!(user.email.as_deref(), Some("a@example.com"));
    }

    #[tokio::test]
    async fn rejects_foreign_and_expired_tokens() {
        let auth = JwtAuth::new("test-secret");
        let other = JwtAuth::new("other-secret");
        let claims = Claims::for_user("user-1", None, Duration::hours(1));
        let foreign = other.sign(&claims).unwrap();
        assert!(matches!(auth.get_user(&foreign).await, Err(AuthError::InvalidToken(_))));

        let expired = auth.sign(&Claims::for_user("user-1", None, Duration::minutes(-5))).unwrap();
        assert!(matches!(auth.get_user(&expired).await, Err(AuthError::InvalidToken(_))));
    }

    #[tokio::test]
    async fn rejects_token_without_subject() {
        let auth = JwtAuth::new("test-secret");
        let mut claims = Claims::for_user("ignored", None, Duration::hours(1));
        claims.sub = None;
        let token = auth.sign(&claims).unwrap();
        assert!(matches!(auth.get_user(&token).await, Err(AuthError::InvalidToken(_))));
    }
}
