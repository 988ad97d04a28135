// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::session::SessionError;

/// HTTP API error carrying a status, a machine code and a client-facing message.
/// Every variant renders as a JSON object with an `error` string.
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 405 Method Not Allowed
    MethodNotAllowed,

    // 500 Internal Server Error
    DatabaseError {
        message: String,
        details: Option<String>,
    },
    InternalServerError {
        message: String,
        details: Option<String>,
    },

    // 503 Service Unavailable
    ServiceUnavailable(String),

    // Session gate rejections keep their own code and status
    Session(SessionError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::ValidationError { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::DatabaseError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::InternalServerError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Session(err) => err.code.status(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::ValidationError { message, .. } => message,
            ApiError::Unauthorized(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::MethodNotAllowed => "Method not allowed",
            ApiError::DatabaseError { message, .. } => message,
            ApiError::InternalServerError { message, .. } => message,
            ApiError::ServiceUnavailable(msg) => msg,
            ApiError::Session(err) => &err.message,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            ApiError::DatabaseError { .. } => "DATABASE_ERROR",
            ApiError::InternalServerError { .. } => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            ApiError::Session(err) => err.code.as_str(),
        }
    }

    pub fn to_json(&self) -> Value {
        let mut response = json!({
            "error": self.message(),
            "code": self.error_code(),
        });

        match self {
            ApiError::ValidationError { field_errors: Some(field_errors), .. } => {
                response["field_errors"] = json!(field_errors);
            }
            ApiError::DatabaseError { details: Some(details), .. }
            | ApiError::InternalServerError { details: Some(details), .. } => {
                response["details"] = json!(details);
            }
            _ => {}
        }

        response
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation_error(
        message: impl Into<String>,
        field_errors: Option<HashMap<String, String>>,
    ) -> Self {
        ApiError::ValidationError { message: message.into(), field_errors }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    /// 500 with a client-facing summary and the underlying database message.
    pub fn database_error(message: impl Into<String>, details: impl std::fmt::Display) -> Self {
        ApiError::DatabaseError { message: message.into(), details: Some(details.to_string()) }
    }

    /// Generic 500 that still carries the underlying message for diagnostics.
    pub fn internal(details: impl std::fmt::Display) -> Self {
        ApiError::InternalServerError {
            message: "Internal server error".to_string(),
            details: Some(details.to_string()),
        }
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        ApiError::Session(err)
    }
}

impl From<crate::database::DatabaseError> for ApiError {
    fn from(err: crate::database::DatabaseError) -> Self {
        use crate::database::DatabaseError;

        match err {
            DatabaseError::NotFound(msg) => ApiError::not_found(msg),
            DatabaseError::InvalidInput(msg) => ApiError::bad_request(msg),
            DatabaseError::InvalidDatabaseUrl(msg) => {
                tracing::error!("Invalid database URL: {}", msg);
                ApiError::internal("database is misconfigured")
            }
            DatabaseError::Rpc { function, message } => {
                tracing::error!("RPC {} failed: {}", function, message);
                ApiError::database_error(format!("{} failed", function), message)
            }
            DatabaseError::Decode(msg) => {
                tracing::error!("Row decode error: {}", msg);
                ApiError::database_error("Unexpected data returned by the database", msg)
            }
            DatabaseError::Sqlx(sqlx::Error::PoolTimedOut) | DatabaseError::Sqlx(sqlx::Error::Io(_)) => {
                tracing::error!("Database connection failure");
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            DatabaseError::Sqlx(sqlx_err) => {
                tracing::error!("SQLx error: {}", sqlx_err);
                ApiError::database_error("Database error occurred", sqlx_err)
            }
        }
    }
}

impl From<crate::filter::FilterError> for ApiError {
    fn from(err: crate::filter::FilterError) -> Self {
        ApiError::bad_request(err.to_string())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status_code(), Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionErrorCode;

    #[test]
    fn not_found_renders_error_string() {
        let err = ApiError::not_found("Budget not found or access denied");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        let body = err.to_json();
        assert_eq!(body["error"], "Budget not found or access denied");
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[test]
    fn internal_error_keeps_details() {
        let err = ApiError::internal("connection reset by peer");
        let body = err.to_json();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
        assert_eq!(body["details"], "connection reset by peer");
    }

    #[test]
    fn database_failures_carry_the_underlying_message() {
        let err: ApiError = crate::database::DatabaseError::Rpc {
            function: "get_cleanup_stats",
            message: "relation does not exist".to_string(),
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = err.to_json();
        assert_eq!(body["error"], "get_cleanup_stats failed");
        assert_eq!(body["code"], "DATABASE_ERROR");
        assert_eq!(body["details"], "relation does not exist");

        let err: ApiError = crate::database::DatabaseError::Decode("bad amount".to_string()).into();
        assert_eq!(err.to_json()["details"], "bad amount");
    }

    #[test]
    fn session_error_maps_code_and_status() {
        let err: ApiError = SessionError::new(SessionErrorCode::MissingDeviceId, "missing").into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_json()["code"], "MISSING_DEVICE_ID");
    }

    #[test]
    fn validation_error_includes_field_errors() {
        let mut fields = HashMap::new();
        fields.insert("amount".to_string(), "Amount must be greater than zero".to_string());
        let body = ApiError::validation_error("Invalid request body", Some(fields)).to_json();
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(body["field_errors"]["amount"], "Amount must be greater than zero");
    }
}
