use axum::{body::Bytes, extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::ApiError;
use crate::models::CleanupSummary;

pub const DEFAULT_DAYS_BACK: i32 = 30;
pub const MAX_DAYS_BACK: i32 = 3650;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CleanupRequest {
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub days_back: Option<i32>,
}

/// POST /cleanup - Report (dry run) or run the backend cleanup jobs
pub async fn post(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    // An empty body means a real run with defaults; a malformed one is rejected.
    let request: CleanupRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CleanupRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::validation_error(format!("Invalid cleanup request: {}", e), None))?
    };
    let days_back = request.days_back.unwrap_or(DEFAULT_DAYS_BACK);
    if !(0..=MAX_DAYS_BACK).contains(&days_back) {
        return Err(ApiError::bad_request(format!(
            "days_back must be between 0 and {}",
            MAX_DAYS_BACK
        )));
    }

    if request.dry_run {
        let stats = state.backend.get_cleanup_stats(days_back).await?;
        return Ok(Json(json!({
            "dry_run": true,
            "days_back": days_back,
            "stats": stats,
        })));
    }

    let results = state.backend.run_all_cleanup_jobs().await?;
    let summary = CleanupSummary::from_results(&results);

    tracing::info!(
        "Cleanup finished: {}/{} jobs succeeded, {} records cleaned in {}ms",
        summary.successful_jobs,
        summary.total_jobs,
        summary.total_records_cleaned,
        summary.total_execution_time_ms
    );

    Ok(Json(json!({
        "dry_run": false,
        "success": summary.failed_jobs == 0,
        "summary": summary,
        "results": results,
    })))
}
