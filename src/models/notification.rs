use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Generated by backend rules (low balance, goal reached, ...). Read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct NotificationData {
    pub id: String,
    pub user_id: String,
    pub budget_id: Option<String>,
    pub envelope_id: Option<String>,
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuditEvent {
    pub id: String,
    pub user_id: String,
    pub event_type: String,
    pub table_name: Option<String>,
    pub record_id: Option<String>,
    pub details: Value,
    pub created_at: DateTime<Utc>,
}
