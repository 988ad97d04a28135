use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{owned_budget, ValidJson};
use crate::models::{Transaction, UpdateTransactionRequest};
use crate::session::ValidSession;

/// Load a live transaction and re-check that the caller owns its budget.
async fn owned_transaction(
    state: &AppState,
    session: &ValidSession,
    id: &str,
) -> Result<Transaction, ApiError> {
    let transaction = state
        .backend
        .get_transaction(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Transaction not found"))?;

    owned_budget(state.backend.as_ref(), &transaction.budget_id, session.user_id()).await?;
    Ok(transaction)
}

/// GET /transactions/:id - Get a single transaction
pub async fn get(
    State(state): State<AppState>,
    Extension(session): Extension<ValidSession>,
    Path(id): Path<String>,
) -> Result<Json<Transaction>, ApiError> {
    let transaction = owned_transaction(&state, &session, &id).await?;
    Ok(Json(transaction))
}

/// PATCH /transactions/:id - Update the mutable flags and references
pub async fn patch(
    State(state): State<AppState>,
    Extension(session): Extension<ValidSession>,
    Path(id): Path<String>,
    ValidJson(changes): ValidJson<UpdateTransactionRequest>,
) -> Result<Json<Transaction>, ApiError> {
    if changes.is_empty() {
        return Err(ApiError::bad_request("No fields to update"));
    }

    let existing = owned_transaction(&state, &session, &id).await?;
    let updated = state.backend.update_transaction(&id, &changes).await?;
    state.cache.invalidate_budget_cache(&existing.budget_id);

    tracing::info!("Transaction {} updated by {}", id, session.user_id());
    Ok(Json(updated))
}

/// DELETE /transactions/:id - Soft delete
pub async fn delete(
    State(state): State<AppState>,
    Extension(session): Extension<ValidSession>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let existing = owned_transaction(&state, &session, &id).await?;
    state.backend.soft_delete_transaction(&id).await?;
    state.cache.invalidate_budget_cache(&existing.budget_id);

    tracing::info!("Transaction {} deleted by {}", id, session.user_id());
    Ok(Json(json!({ "success": true, "id": id })))
}
