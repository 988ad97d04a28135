pub mod auth;
pub mod ownership;
pub mod request;
pub mod response;

pub use auth::{require_bearer, require_service_role, require_session};
pub use ownership::{owned_budget, BUDGET_ACCESS_DENIED};
pub use request::{ValidJson, ValidQuery};
pub use response::{ApiResponse, ApiResult};
