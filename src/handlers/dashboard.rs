use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::cache::CacheKeys;
use crate::error::ApiError;
use crate::filter::{Page, TransactionFilter};
use crate::middleware::owned_budget;
use crate::models::EnvelopesSummary;
use crate::session::ValidSession;

const RECENT_TRANSACTIONS: i64 = 10;

/// GET /budgets/:budget_id/dashboard - Budget, envelope aggregates and recent activity
pub async fn get(
    State(state): State<AppState>,
    Extension(session): Extension<ValidSession>,
    Path(budget_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let budget = owned_budget(state.backend.as_ref(), &budget_id, session.user_id()).await?;

    let cache_key = CacheKeys::dashboard(&budget_id);
    if let Some(cached) = state.cache.get(&cache_key) {
        tracing::debug!("Cache hit for {}", cache_key);
        return Ok(Json(cached));
    }

    let envelopes = state.backend.list_envelopes(&budget_id).await?;
    let recent = state
        .backend
        .list_transactions(
            &budget_id,
            &TransactionFilter::default(),
            Page { limit: RECENT_TRANSACTIONS, offset: 0 },
        )
        .await?;

    let body = json!({
        "budget": budget,
        "envelopes_summary": EnvelopesSummary::from_envelopes(&envelopes),
        "recent_transactions": recent,
        "generated_at": chrono::Utc::now(),
    });

    state.cache.set(cache_key, body.clone());
    Ok(Json(body))
}
