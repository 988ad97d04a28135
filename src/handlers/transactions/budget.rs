use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::cache::CacheKeys;
use crate::error::ApiError;
use crate::filter::TransactionFilter;
use crate::middleware::{owned_budget, ValidQuery};
use crate::session::ValidSession;

/// GET /budgets/:budget_id/transactions - Filtered, paginated ledger for one budget
pub async fn list(
    State(state): State<AppState>,
    Extension(session): Extension<ValidSession>,
    Path(budget_id): Path<String>,
    ValidQuery(filter): ValidQuery<TransactionFilter>,
) -> Result<Json<Value>, ApiError> {
    owned_budget(state.backend.as_ref(), &budget_id, session.user_id()).await?;

    let page = filter.page(state.config.api.default_limit, state.config.api.max_limit)?;

    let query_key = serde_json::to_string(&filter).map_err(ApiError::internal)?;
    let cache_key = CacheKeys::transactions(&budget_id, &query_key);
    if let Some(cached) = state.cache.get(&cache_key) {
        tracing::debug!("Cache hit for {}", cache_key);
        return Ok(Json(cached));
    }

    let transactions = state.backend.list_transactions(&budget_id, &filter, page).await?;
    let body = json!({
        "transactions": transactions,
        "limit": page.limit,
        "offset": page.offset,
    });

    state.cache.set(cache_key, body.clone());
    Ok(Json(body))
}
