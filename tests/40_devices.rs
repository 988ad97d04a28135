mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use common::{request, TestApp, DEVICE, USER};
use serde_json::{json, Value};

async fn on_device(
    app: &TestApp,
    method: Method,
    uri: &str,
    device: &str,
    body: Option<Value>,
) -> Result<(StatusCode, Value)> {
    let token = app.token(USER);
    app.send(request(method, uri, Some(&token), Some(device), body)).await
}

#[tokio::test]
async fn register_creates_then_refreshes() -> Result<()> {
    let app = TestApp::new();

    let (status, body) = app
        .call(Method::POST, "/devices/register", USER, Some(json!({ "device_name": "Pixel", "device_type": "android" })))
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["device_id"], DEVICE);
    assert_eq!(body["device_name"], "Pixel");
    assert_eq!(body["is_revoked"], false);

    let (status, body) = app
        .call(Method::POST, "/devices/register", USER, Some(json!({ "device_name": "Pixel 8" })))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["device_name"], "Pixel 8");
    assert_eq!(body["device_type"], "android");
    Ok(())
}

#[tokio::test]
async fn register_requires_a_name() -> Result<()> {
    let app = TestApp::new();

    let (status, body) = app
        .call(Method::POST, "/devices/register", USER, Some(json!({ "device_name": "  " })))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["field_errors"]["device_name"].is_string());
    Ok(())
}

#[tokio::test]
async fn list_marks_the_current_device() -> Result<()> {
    let app = TestApp::new();
    for device in [DEVICE, "device-2"] {
        let (status, _) = on_device(&app, Method::POST, "/devices/register", device, Some(json!({ "device_name": device }))).await?;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = app.call(Method::GET, "/devices", USER, None).await?;
    assert_eq!(status, StatusCode::OK);
    let devices = body["devices"].as_array().unwrap();
    assert_eq!(devices.len(), 2);
    for device in devices {
        assert_eq!(device["is_current"], device["device_id"] == DEVICE);
    }
    Ok(())
}

#[tokio::test]
async fn revoked_device_loses_its_session() -> Result<()> {
    let app = TestApp::new();
    for device in [DEVICE, "device-2"] {
        on_device(&app, Method::POST, "/devices/register", device, Some(json!({ "device_name": device }))).await?;
    }

    let (status, body) = app.call(Method::DELETE, "/devices/device-2", USER, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["device"]["is_revoked"], true);

    let (status, body) = on_device(&app, Method::GET, "/budgets", "device-2", None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "SESSION_INVALIDATED");

    let (status, _) = app.call(Method::GET, "/budgets", USER, None).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.call(Method::DELETE, "/devices/unknown", USER, None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Device not found");
    Ok(())
}

#[tokio::test]
async fn signout_all_keeps_only_the_caller() -> Result<()> {
    let app = TestApp::new();
    for device in [DEVICE, "device-2", "device-3"] {
        on_device(&app, Method::POST, "/devices/register", device, Some(json!({ "device_name": device }))).await?;
    }

    let (status, body) = app.call(Method::POST, "/devices/signout-all", USER, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["revoked"], 2);

    for device in ["device-2", "device-3"] {
        let (status, _) = on_device(&app, Method::GET, "/devices", device, None).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
    let (status, _) = app.call(Method::GET, "/devices", USER, None).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}
