use axum::{extract::State, Extension};

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{owned_budget, ApiResponse, ApiResult, ValidJson};
use crate::models::{CreateTransactionRequest, Transaction};
use crate::session::ValidSession;

/// POST /transactions-simple - Insert one transaction into an owned budget
pub async fn create(
    State(state): State<AppState>,
    Extension(session): Extension<ValidSession>,
    ValidJson(request): ValidJson<CreateTransactionRequest>,
) -> ApiResult<Transaction> {
    request
        .validate()
        .map_err(|fields| ApiError::validation_error("Invalid transaction data", Some(fields)))?;

    owned_budget(state.backend.as_ref(), &request.budget_id, session.user_id()).await?;

    let transaction = state.backend.insert_transaction(&request).await?;
    state.cache.invalidate_budget_cache(&transaction.budget_id);

    tracing::info!(
        "Created {} transaction {} in budget {}",
        transaction.transaction_type,
        transaction.id,
        transaction.budget_id
    );
    Ok(ApiResponse::created(transaction))
}
