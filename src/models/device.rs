use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One registered install of the client. Revocation is terminal: a revoked device
/// cannot be registered again under the same device id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Device {
    pub id: String,
    pub user_id: String,
    pub device_id: String,
    pub device_name: String,
    pub device_type: Option<String>,
    pub push_token: Option<String>,
    pub app_version: Option<String>,
    pub last_location: Option<String>,
    pub is_revoked: bool,
    pub last_seen: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterDeviceRequest {
    pub device_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_location: Option<String>,
}
