use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Profile returned by the auth provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// What the client keeps on disk between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedAuthData {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
    pub created_at: DateTime<Utc>,
}

/// Client-side view of the current session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthState {
    pub is_authenticated: bool,
    pub user: Option<User>,
    pub access_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<&PersistedAuthData> for AuthState {
    fn from(data: &PersistedAuthData) -> Self {
        Self {
            is_authenticated: true,
            user: Some(data.user.clone()),
            access_token: Some(data.access_token.clone()),
            expires_at: Some(data.expires_at),
        }
    }
}
