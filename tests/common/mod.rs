#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use tower::ServiceExt;

use nvlp_api::auth::{Claims, JwtAuth};
use nvlp_api::config::AppConfig;
use nvlp_api::database::MemoryBackend;
use nvlp_api::models::{Budget, Envelope, EnvelopeType, Transaction, TransactionType};
use nvlp_api::{router, AppState};

pub const SECRET: &str = "integration-test-secret";
pub const SERVICE_KEY: &str = "service-role-key";
pub const DEVICE: &str = "device-1";
pub const USER: &str = "user-1";
pub const OTHER_USER: &str = "user-2";

/// Router over an in-memory backend. `backend` stays reachable for seeding.
pub struct TestApp {
    pub state: AppState,
    pub backend: Arc<MemoryBackend>,
    signer: JwtAuth,
}

impl TestApp {
    pub fn new() -> Self {
        let backend = Arc::new(MemoryBackend::new());
        let state = AppState::new(
            AppConfig::local(SECRET),
            backend.clone(),
            Arc::new(JwtAuth::new(SECRET)),
        );
        Self { state, backend, signer: JwtAuth::new(SECRET) }
    }

    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    pub fn token(&self, user_id: &str) -> String {
        let claims = Claims::for_user(user_id, Some(format!("{}@example.com", user_id)), chrono::Duration::hours(1));
        self.signer.sign(&claims).expect("sign test token")
    }

    pub async fn send(&self, request: Request<Body>) -> Result<(StatusCode, Value)> {
        let response = self.router().oneshot(request).await?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes)? };
        Ok((status, body))
    }

    /// Authenticated request from `user` on the default device.
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        user: &str,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let token = self.token(user);
        self.send(request(method, uri, Some(&token), Some(DEVICE), body)).await
    }

    pub async fn seed_budget(&self, id: &str, user_id: &str) -> Budget {
        let budget = budget(id, user_id);
        self.backend.insert_budget(budget.clone()).await;
        budget
    }
}

pub fn request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    device: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    if let Some(device) = device {
        builder = builder.header("x-device-id", device);
    }
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    builder.body(body).expect("build test request")
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn budget(id: &str, user_id: &str) -> Budget {
    let now = Utc::now();
    Budget {
        id: id.to_string(),
        user_id: user_id.to_string(),
        name: format!("Budget {}", id),
        description: None,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

pub fn envelope(id: &str, budget_id: &str, kind: EnvelopeType, balance: i64) -> Envelope {
    let now = Utc::now();
    Envelope {
        id: id.to_string(),
        budget_id: budget_id.to_string(),
        name: format!("Envelope {}", id),
        description: None,
        envelope_type: kind,
        category_id: None,
        current_balance: Decimal::new(balance, 0),
        target_amount: None,
        debt_balance: Decimal::ZERO,
        minimum_payment: None,
        notify_on_low_balance: false,
        low_balance_threshold: None,
        notify_above_amount: None,
        is_active: true,
        sort_order: 0,
        created_at: now,
        updated_at: now,
    }
}

pub fn transaction(
    id: &str,
    budget_id: &str,
    kind: TransactionType,
    amount: i64,
    on: NaiveDate,
) -> Transaction {
    let now = Utc::now();
    Transaction {
        id: id.to_string(),
        budget_id: budget_id.to_string(),
        transaction_type: kind,
        amount: Decimal::new(amount, 0),
        description: None,
        transaction_date: on,
        from_envelope_id: None,
        to_envelope_id: None,
        payee_id: None,
        income_source_id: None,
        category_id: None,
        is_cleared: false,
        is_reconciled: false,
        is_deleted: false,
        created_at: now,
        updated_at: now,
    }
}
