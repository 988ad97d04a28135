use crate::database::Backend;
use crate::error::ApiError;
use crate::models::Budget;

pub const BUDGET_ACCESS_DENIED: &str = "Budget not found or access denied";

/// Fetch a budget only if `user_id` owns it. Missing and foreign budgets look the same
/// to the caller.
pub async fn owned_budget(
    backend: &dyn Backend,
    budget_id: &str,
    user_id: &str,
) -> Result<Budget, ApiError> {
    match backend.find_owned_budget(budget_id, user_id).await? {
        Some(budget) => Ok(budget),
        None => {
            tracing::warn!("User {} denied access to budget {}", user_id, budget_id);
            Err(ApiError::not_found(BUDGET_ACCESS_DENIED))
        }
    }
}
