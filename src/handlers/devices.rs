use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, ValidJson};
use crate::models::{Device, RegisterDeviceRequest};
use crate::session::ValidSession;

/// POST /devices/register - Register or refresh the calling device
pub async fn register(
    State(state): State<AppState>,
    Extension(session): Extension<ValidSession>,
    ValidJson(request): ValidJson<RegisterDeviceRequest>,
) -> ApiResult<Device> {
    if request.device_name.trim().is_empty() {
        let mut fields = std::collections::HashMap::new();
        fields.insert("device_name".to_string(), "This field is required".to_string());
        return Err(ApiError::validation_error("Invalid device data", Some(fields)));
    }

    let existing = state.backend.find_device(session.user_id(), &session.device_id).await?;
    if existing.is_some_and(|device| device.is_revoked) {
        tracing::warn!("Revoked device {} tried to register", session.device_id);
        return Err(ApiError::forbidden("Device has been revoked"));
    }

    let registration = state
        .backend
        .register_device(session.user_id(), &session.device_id, &request)
        .await?;

    let status = if registration.created {
        tracing::info!("Registered device {} for user {}", session.device_id, session.user_id());
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok(ApiResponse::with_status(registration.device, status))
}

/// GET /devices - The caller's devices, flagging the one making this request
pub async fn list(
    State(state): State<AppState>,
    Extension(session): Extension<ValidSession>,
) -> Result<Json<Value>, ApiError> {
    let devices = state.backend.list_devices(session.user_id()).await?;

    let devices: Vec<Value> = devices
        .into_iter()
        .map(|device| {
            let is_current = device.device_id == session.device_id;
            let mut value = json!(device);
            value["is_current"] = json!(is_current);
            value
        })
        .collect();

    Ok(Json(json!({ "devices": devices })))
}

/// DELETE /devices/:device_id - Revoke one device and invalidate its session
pub async fn revoke(
    State(state): State<AppState>,
    Extension(session): Extension<ValidSession>,
    Path(device_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let device = state
        .backend
        .revoke_device(session.user_id(), &device_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Device not found"))?;

    tracing::info!("User {} revoked device {}", session.user_id(), device_id);
    Ok(Json(json!({ "success": true, "device": device })))
}

/// POST /devices/signout-all - Revoke every device except the current one
pub async fn signout_all(
    State(state): State<AppState>,
    Extension(session): Extension<ValidSession>,
) -> Result<Json<Value>, ApiError> {
    let revoked = state
        .backend
        .revoke_other_devices(session.user_id(), &session.device_id)
        .await?;

    tracing::info!("User {} signed out {} other devices", session.user_id(), revoked);
    Ok(Json(json!({ "success": true, "revoked": revoked })))
}
