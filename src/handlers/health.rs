use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::app::AppState;

/// GET /health - Backend reachability and cache size
pub async fn get(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.backend.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "timestamp": now,
                "database": "ok",
                "cache_entries": state.cache.size(),
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "error": "database unavailable",
                    "status": "degraded",
                    "timestamp": now,
                })),
            )
        }
    }
}
