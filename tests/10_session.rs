mod common;

use anyhow::Result;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use common::{request, TestApp, DEVICE, USER};

#[tokio::test]
async fn health_is_public() -> Result<()> {
    let app = TestApp::new();
    let (status, body) = app.send(request(Method::GET, "/health", None, None, None)).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "ok");
    Ok(())
}

#[tokio::test]
async fn missing_device_id_is_checked_before_the_token() -> Result<()> {
    let app = TestApp::new();
    let (status, body) = app
        .send(request(Method::GET, "/budgets", Some("garbage"), None, None))
        .await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_DEVICE_ID");
    Ok(())
}

#[tokio::test]
async fn bad_or_missing_token_is_unauthorized() -> Result<()> {
    let app = TestApp::new();

    let (status, body) = app
        .send(request(Method::GET, "/budgets", Some("not-a-jwt"), Some(DEVICE), None))
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_AUTH");

    let (status, body) = app.send(request(Method::GET, "/budgets", None, Some(DEVICE), None)).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_AUTH");
    Ok(())
}

#[tokio::test]
async fn invalidated_session_is_rejected() -> Result<()> {
    let app = TestApp::new();
    app.backend.invalidate_session(USER, DEVICE).await;

    let (status, body) = app.call(Method::GET, "/budgets", USER, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "SESSION_INVALIDATED");

    // Another device for the same user is unaffected
    let token = app.token(USER);
    let (status, _) = app
        .send(request(Method::GET, "/budgets", Some(&token), Some("device-2"), None))
        .await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn failed_invalidation_check_is_a_server_error() -> Result<()> {
    let app = TestApp::new();
    app.backend.fail_rpc("is_session_invalidated").await;

    let (status, body) = app.call(Method::GET, "/budgets", USER, None).await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    Ok(())
}

#[tokio::test]
async fn auth_user_needs_only_a_bearer_token() -> Result<()> {
    let app = TestApp::new();
    let token = app.token(USER);

    let (status, body) = app.send(request(Method::GET, "/auth/user", Some(&token), None, None)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], USER);
    assert_eq!(body["email"], "user-1@example.com");

    let (status, body) = app.send(request(Method::POST, "/auth/logout", Some(&token), None, None)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, _) = app.send(request(Method::GET, "/auth/user", None, None, None)).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn wrong_method_is_405_before_auth() -> Result<()> {
    let app = TestApp::new();
    let (status, body) = app.send(request(Method::PUT, "/budgets", None, None, None)).await?;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["error"], "Method not allowed");
    Ok(())
}

#[tokio::test]
async fn unknown_path_is_404() -> Result<()> {
    let app = TestApp::new();
    let (status, body) = app.send(request(Method::GET, "/nope", None, None, None)).await?;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not found");
    Ok(())
}

#[tokio::test]
async fn cors_preflight_allows_device_header() -> Result<()> {
    let app = TestApp::new();
    let preflight = Request::builder()
        .method(Method::OPTIONS)
        .uri("/budgets")
        .header("origin", "http://localhost:8081")
        .header("access-control-request-method", "GET")
        .header("access-control-request-headers", "authorization,x-device-id")
        .body(Body::empty())?;

    let response = tower::ServiceExt::oneshot(app.router(), preflight).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("access-control-allow-origin").and_then(|v| v.to_str().ok()),
        Some("*")
    );
    let allowed = response
        .headers()
        .get("access-control-allow-headers")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();
    assert!(allowed.contains("x-device-id"), "allow-headers was {}", allowed);
    Ok(())
}
