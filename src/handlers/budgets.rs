use axum::{extract::State, Extension, Json};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::ApiError;
use crate::session::ValidSession;

/// GET /budgets - Budgets owned by the caller
pub async fn list(
    State(state): State<AppState>,
    Extension(session): Extension<ValidSession>,
) -> Result<Json<Value>, ApiError> {
    let budgets = state.backend.list_budgets(session.user_id()).await?;
    Ok(Json(json!({ "budgets": budgets })))
}
