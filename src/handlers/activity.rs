use axum::{extract::State, Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::ApiError;
use crate::filter::DEFAULT_LIMIT;
use crate::middleware::ValidQuery;
use crate::session::ValidSession;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AuditQuery {
    #[serde(default)]
    pub limit: Option<i64>,
}

/// GET /notifications - Notifications for the caller, optionally unread only
pub async fn notifications(
    State(state): State<AppState>,
    Extension(session): Extension<ValidSession>,
    ValidQuery(query): ValidQuery<NotificationQuery>,
) -> Result<Json<Value>, ApiError> {
    let notifications = state
        .backend
        .list_notifications(session.user_id(), query.unread_only.unwrap_or(false))
        .await?;
    Ok(Json(json!({ "notifications": notifications })))
}

/// GET /audit-events - Newest audit events for the caller
pub async fn audit_events(
    State(state): State<AppState>,
    Extension(session): Extension<ValidSession>,
    ValidQuery(query): ValidQuery<AuditQuery>,
) -> Result<Json<Value>, ApiError> {
    let limit = match query.limit {
        Some(limit) if limit < 0 => return Err(ApiError::bad_request("Limit must be non-negative")),
        Some(limit) => limit.min(state.config.api.max_limit),
        None => DEFAULT_LIMIT,
    };

    let events = state.backend.list_audit_events(session.user_id(), limit).await?;
    Ok(Json(json!({ "events": events })))
}
