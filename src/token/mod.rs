//! Client-side persistence of access and refresh tokens.
//!
//! Storage problems never surface to callers: a token that cannot be written is
//! still usable for the current process, and one that cannot be read means the user
//! signs in again.

pub mod storage;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::sync::Mutex;

use crate::models::{AuthState, PersistedAuthData, User};

pub use storage::{FileTokenStorage, MemoryTokenStorage, TokenStorage};

/// Tokens closer than this to expiry are refreshed before use.
pub const REFRESH_THRESHOLD_SECS: i64 = 5 * 60;

const FALLBACK_EXPIRES_IN_SECS: i64 = 3600;

pub struct TokenManager<S: TokenStorage> {
    storage: S,
    auto_refresh: bool,
    current: Mutex<Option<PersistedAuthData>>,
}

#[derive(Deserialize)]
struct ExpiryClaim {
    exp: i64,
}

impl<S: TokenStorage> TokenManager<S> {
    pub fn new(storage: S) -> Self {
        Self { storage, auto_refresh: true, current: Mutex::new(None) }
    }

    pub fn with_auto_refresh(mut self, auto_refresh: bool) -> Self {
        self.auto_refresh = auto_refresh;
        self
    }

    fn current(&self) -> std::sync::MutexGuard<'_, Option<PersistedAuthData>> {
        self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Persist a fresh sign-in. `expires_in_secs` of zero or less falls back to the
    /// token's own `exp` claim.
    pub fn save_tokens(
        &self,
        access_token: &str,
        refresh_token: &str,
        expires_in_secs: i64,
        user: User,
    ) -> PersistedAuthData {
        let now = Utc::now();
        let data = PersistedAuthData {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
            expires_at: expiry(access_token, expires_in_secs, now),
            user,
            created_at: now,
        };
        self.persist(&data);
        *self.current() = Some(data.clone());
        data
    }

    /// Stored tokens, or `None` once they have expired. Expired tokens are removed
    /// from storage as a side effect.
    pub fn load_tokens(&self) -> Option<PersistedAuthData> {
        let cached = self.current().clone();
        let data = match cached {
            Some(data) => data,
            None => self.read_stored()?,
        };

        if data.expires_at <= Utc::now() {
            tracing::info!("Stored session expired at {}, clearing", data.expires_at);
            self.clear_tokens();
            return None;
        }

        *self.current() = Some(data.clone());
        Some(data)
    }

    fn read_stored(&self) -> Option<PersistedAuthData> {
        let contents = match self.storage.read() {
            Ok(Some(contents)) => contents,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Failed to read stored tokens: {}", e);
                return None;
            }
        };

        serde_json::from_str(&contents)
            .map_err(|e| tracing::warn!("Ignoring unreadable stored tokens: {}", e))
            .ok()
    }

    pub fn clear_tokens(&self) {
        *self.current() = None;
        if let Err(e) = self.storage.remove() {
            tracing::warn!("Failed to remove stored tokens: {}", e);
        }
    }

    pub fn needs_refresh(&self) -> bool {
        if !self.auto_refresh {
            return false;
        }
        match self.load_tokens() {
            Some(data) => data.expires_at - Utc::now() < Duration::seconds(REFRESH_THRESHOLD_SECS),
            None => false,
        }
    }

    /// Swap in refreshed tokens, keeping the stored user. `None` when nothing is stored.
    pub fn update_access_token(
        &self,
        access_token: &str,
        refresh_token: &str,
        expires_in_secs: i64,
    ) -> Option<PersistedAuthData> {
        let mut data = self.load_tokens()?;
        data.access_token = access_token.to_string();
        data.refresh_token = refresh_token.to_string();
        data.expires_at = expiry(access_token, expires_in_secs, Utc::now());

        self.persist(&data);
        *self.current() = Some(data.clone());
        Some(data)
    }

    pub fn access_token(&self) -> Option<String> {
        self.load_tokens().map(|data| data.access_token)
    }

    pub fn auth_state(&self) -> AuthState {
        self.load_tokens().as_ref().map(AuthState::from).unwrap_or_default()
    }

    fn persist(&self, data: &PersistedAuthData) {
        let result = serde_json::to_string_pretty(data)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
            .and_then(|contents| self.storage.write(&contents));
        if let Err(e) = result {
            tracing::warn!("Failed to persist tokens: {}", e);
        }
    }
}

/// Read `exp` without verifying the signature. The client holds no secret and only
/// needs the timestamp to schedule refreshes.
pub fn parse_jwt_expiration(token: &str) -> Option<DateTime<Utc>> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;

    let data = decode::<ExpiryClaim>(token, &DecodingKey::from_secret(&[]), &validation).ok()?;
    DateTime::from_timestamp(data.claims.exp, 0)
}

fn expiry(access_token: &str, expires_in_secs: i64, now: DateTime<Utc>) -> DateTime<Utc> {
    if expires_in_secs > 0 {
        return now + Duration::seconds(expires_in_secs);
    }
    parse_jwt_expiration(access_token)
        .unwrap_or_else(|| now + Duration::seconds(FALLBACK_EXPIRES_IN_SECS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Claims, JwtAuth};

    fn user() -> User {
        User {
            id: "user-1".to_string(),
            email: Some("a@example.com".to_string()),
            role: None,
            display_name: None,
            created_at: None,
        }
    }

    #[test]
    fn save_then_load_keeps_user() {
        let manager = TokenManager::new(MemoryTokenStorage::new());
        assert!(manager.load_tokens().is_none());
        manager.save_tokens("access", "refresh", 3600, user());

        let data = manager.load_tokens().unwrap();
        assert_eq!(data.access_token, "access");
        assert_eq!(data.refresh_token, "refresh");
        assert_eq!(data.user, user());
        assert!(manager.auth_state().is_authenticated);
    }

    #[test]
    fn needs_refresh_inside_threshold() {
        let manager = TokenManager::new(MemoryTokenStorage::new());
        manager.save_tokens("access", "refresh", 60, user());
        assert!(manager.needs_refresh());

        manager.update_access_token("access-2", "refresh-2", 3600).unwrap();
        assert!(!manager.needs_refresh());
        assert_eq!(manager.access_token().as_deref(), Some("access-2"));
    }

    #[test]
    fn auto_refresh_off_never_needs_refresh() {
        let manager = TokenManager::new(MemoryTokenStorage::new()).with_auto_refresh(false);
        manager.save_tokens("access", "refresh", 1, user());
        assert!(!manager.needs_refresh());
    }

    #[test]
    fn clear_tokens_forgets_everything() {
        let manager = TokenManager::new(MemoryTokenStorage::new());
        manager.save_tokens("access", "refresh", 3600, user());
        manager.clear_tokens();
        assert!(manager.load_tokens().is_none());
        assert!(!manager.auth_state().is_authenticated);
        assert!(manager.update_access_token("a", "r", 10).is_none());
    }

    #[test]
    fn expired_tokens_are_dropped_from_storage() {
        let manager = TokenManager::new(MemoryTokenStorage::new());
        let stale = PersistedAuthData {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: Utc::now() - Duration::seconds(1),
            user: user(),
            created_at: Utc::now() - Duration::hours(1),
        };
        manager.storage.write(&serde_json::to_string(&stale).unwrap()).unwrap();

        assert!(manager.load_tokens().is_none());
        assert!(manager.storage.read().unwrap().is_none());
        assert!(!manager.needs_refresh());
    }

    #[test]
    fn parses_expiration_without_secret() {
        let auth = JwtAuth::new("some-secret");
        let claims = Claims::for_user("user-1", None, chrono::Duration::minutes(30));
        let token = auth.sign(&claims).unwrap();

        let expires_at = parse_jwt_expiration(&token).unwrap();
        assert_eq!(expires_at.timestamp(), claims.exp);
        assert!(parse_jwt_expiration("not-a-jwt").is_none());
    }

    #[test]
    fn file_storage_persists_across_managers() {
        let dir = std::env::temp_dir().join(format!("nvlp-token-test-{}", uuid::Uuid::new_v4()));
        let manager = TokenManager::new(FileTokenStorage::new(&dir, "default"));
        manager.save_tokens("access", "refresh", 3600, user());

        let reloaded = TokenManager::new(FileTokenStorage::new(&dir, "default"));
        let data = reloaded.load_tokens().unwrap();
        assert_eq!(data.access_token, "access");
        assert_eq!(data.refresh_token, "refresh");
        assert_eq!(data.user, user());

        reloaded.clear_tokens();
        assert!(!dir.join("auth-default.json").exists());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
