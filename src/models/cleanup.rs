use serde::{Deserialize, Serialize};

/// One row returned by the `run_all_cleanup_jobs` RPC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CleanupResult {
    pub job_name: String,
    pub records_cleaned: i64,
    pub execution_time_ms: i64,
    pub status: String,
}

impl CleanupResult {
    pub fn succeeded(&self) -> bool {
        self.status == "success"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleanupSummary {
    pub total_jobs: usize,
    pub successful_jobs: usize,
    pub failed_jobs: usize,
    pub total_records_cleaned: i64,
    pub total_execution_time_ms: i64,
}

impl CleanupSummary {
    pub fn from_results(results: &[CleanupResult]) -> Self {
        results.iter().fold(Self::default(), |mut summary, result| {
            summary.total_jobs += 1;
            if result.succeeded() {
                summary.successful_jobs += 1;
            } else {
                summary.failed_jobs += 1;
            }
            summary.total_records_cleaned += result.records_cleaned;
            summary.total_execution_time_ms += result.execution_time_ms;
            summary
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str, cleaned: i64, ms: i64, status: &str) -> CleanupResult {
        CleanupResult {
            job_name: name.to_string(),
            records_cleaned: cleaned,
            execution_time_ms: ms,
            status: status.to_string(),
        }
    }

    #[test]
    fn summary_splits_success_and_failure() {
        let results = vec![
            result("expired_sessions", 12, 40, "success"),
            result("old_audit_events", 0, 5, "error: relation missing"),
            result("deleted_transactions", 3, 15, "success"),
        ];
        let summary = CleanupSummary::from_results(&results);
        assert_eq!(summary.total_jobs, 3);
        assert_eq!(summary.successful_jobs, 2);
        assert_eq!(summary.failed_jobs, 1);
        assert_eq!(summary.total_records_cleaned, 15);
        assert_eq!(summary.total_execution_time_ms, 60);
    }

    #[test]
    fn empty_results_give_zero_summary() {
        assert_eq!(CleanupSummary::from_results(&[]), CleanupSummary::default());
    }
}
