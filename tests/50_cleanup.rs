mod common;

use anyhow::Result;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use chrono::{Duration, Utc};
use common::{date, request, transaction, TestApp, SERVICE_KEY, USER};
use nvlp_api::models::TransactionType;
use serde_json::json;

async fn seed_stale_rows(app: &TestApp) {
    let mut stale = transaction("old", "b1", TransactionType::Expense, 10, date(2023, 1, 1));
    stale.is_deleted = true;
    stale.updated_at = Utc::now() - Duration::days(45);
    let mut recent = transaction("recent", "b1", TransactionType::Expense, 10, date(2024, 1, 1));
    recent.is_deleted = true;
    let live = transaction("live", "b1", TransactionType::Expense, 10, date(2024, 1, 1));
    for row in [stale, recent, live] {
        app.backend.insert_transaction_row(row).await;
    }
}

#[tokio::test]
async fn cleanup_requires_the_service_key() -> Result<()> {
    let app = TestApp::new();
    let user_token = app.token(USER);

    let (status, body) = app
        .send(request(Method::POST, "/cleanup", Some(&user_token), None, Some(json!({ "dry_run": true }))))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Service role key required");

    let (status, _) = app.send(request(Method::POST, "/cleanup", None, None, None)).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.send(request(Method::GET, "/cleanup", Some(SERVICE_KEY), None, None)).await?;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    Ok(())
}

#[tokio::test]
async fn dry_run_reports_without_deleting() -> Result<()> {
    let app = TestApp::new();
    seed_stale_rows(&app).await;

    let (status, body) = app
        .send(request(Method::POST, "/cleanup", Some(SERVICE_KEY), None, Some(json!({ "dry_run": true }))))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["dry_run"], true);
    assert_eq!(body["days_back"], 30);
    let transactions = body["stats"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["table_name"] == "transactions")
        .cloned()
        .unwrap();
    assert_eq!(transactions["records_to_clean"], 1);

    let (_, body) = app
        .send(request(Method::POST, "/cleanup", Some(SERVICE_KEY), None, Some(json!({ "dry_run": true, "days_back": 0 }))))
        .await?;
    let transactions = &body["stats"][0];
    assert_eq!(transactions["table_name"], "transactions");
    assert_eq!(transactions["records_to_clean"], 2);
    Ok(())
}

#[tokio::test]
async fn empty_body_runs_every_job() -> Result<()> {
    let app = TestApp::new();
    seed_stale_rows(&app).await;

    let (status, body) = app.send(request(Method::POST, "/cleanup", Some(SERVICE_KEY), None, None)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["dry_run"], false);
    assert_eq!(body["success"], true);
    assert_eq!(body["summary"]["total_jobs"], 3);
    assert_eq!(body["summary"]["failed_jobs"], 0);
    assert_eq!(body["summary"]["total_records_cleaned"], 1);
    assert_eq!(body["results"].as_array().unwrap().len(), 3);

    let (_, body) = app
        .send(request(Method::POST, "/cleanup", Some(SERVICE_KEY), None, Some(json!({ "dry_run": true, "days_back": 0 }))))
        .await?;
    assert_eq!(body["stats"][0]["records_to_clean"], 1);
    Ok(())
}

#[tokio::test]
async fn malformed_requests_are_rejected() -> Result<()> {
    let app = TestApp::new();

    let garbage = Request::builder()
        .method(Method::POST)
        .uri("/cleanup")
        .header(header::AUTHORIZATION, format!("Bearer {}", SERVICE_KEY))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))?;
    let (status, _) = app.send(garbage).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(request(Method::POST, "/cleanup", Some(SERVICE_KEY), None, Some(json!({ "days_back": -1 }))))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(request(Method::POST, "/cleanup", Some(SERVICE_KEY), None, Some(json!({ "force": true }))))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn failing_job_rpc_is_a_server_error() -> Result<()> {
    let app = TestApp::new();
    app.backend.fail_rpc("run_all_cleanup_jobs").await;

    let (status, body) = app.send(request(Method::POST, "/cleanup", Some(SERVICE_KEY), None, None)).await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "run_all_cleanup_jobs failed");
    assert_eq!(body["code"], "DATABASE_ERROR");
    assert_eq!(body["details"], "simulated failure");

    app.backend.fail_rpc("get_cleanup_stats").await;
    let (status, body) = app
        .send(request(Method::POST, "/cleanup", Some(SERVICE_KEY), None, Some(json!({ "dry_run": true }))))
        .await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["details"], "simulated failure");
    Ok(())
}

#[tokio::test]
async fn days_back_outside_the_window_is_rejected() -> Result<()> {
    let app = TestApp::new();
    seed_stale_rows(&app).await;

    for days_back in [3651, i32::MAX as i64] {
        let (status, body) = app
            .send(request(
                Method::POST,
                "/cleanup",
                Some(SERVICE_KEY),
                None,
                Some(json!({ "dry_run": true, "days_back": days_back })),
            ))
            .await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "days_back must be between 0 and 3650");
    }

    let (status, body) = app
        .send(request(Method::POST, "/cleanup", Some(SERVICE_KEY), None, Some(json!({ "dry_run": true, "days_back": 3650 }))))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stats"][0]["records_to_clean"], 0);
    Ok(())
}
