use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{delete, get, post, MethodRouter},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::auth::AuthProvider;
use crate::cache::EdgeCache;
use crate::config::AppConfig;
use crate::database::Backend;
use crate::error::ApiError;
use crate::handlers;
use crate::middleware::{require_bearer, require_service_role, require_session};
use crate::session::DEVICE_ID_HEADER;

/// Shared per-process state. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub backend: Arc<dyn Backend>,
    pub auth: Arc<dyn AuthProvider>,
    pub cache: Arc<EdgeCache>,
}

impl AppState {
    pub fn new(config: AppConfig, backend: Arc<dyn Backend>, auth: Arc<dyn AuthProvider>) -> Self {
        let cache = Arc::new(EdgeCache::new(Duration::from_secs(config.cache.default_ttl_secs)));
        Self { config: Arc::new(config), backend, auth, cache }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/health", get(handlers::health::get).fallback(method_not_allowed))
        .merge(auth_routes(&state))
        .merge(budget_routes(&state))
        .merge(transaction_routes(&state))
        .merge(device_routes(&state))
        .merge(activity_routes(&state))
        .merge(cleanup_routes(&state))
        .fallback(not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// The gate wraps only registered methods; a wrong method gets 405 before any auth check.
fn session(state: &AppState, route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    route
        .fallback(method_not_allowed)
        .route_layer(from_fn_with_state(state.clone(), require_session))
}

fn bearer(state: &AppState, route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    route
        .fallback(method_not_allowed)
        .route_layer(from_fn_with_state(state.clone(), require_bearer))
}

fn auth_routes(state: &AppState) -> Router<AppState> {
    use handlers::auth;

    Router::new()
        .route("/auth/user", bearer(state, get(auth::user)))
        .route("/auth/logout", bearer(state, post(auth::logout)))
}

fn budget_routes(state: &AppState) -> Router<AppState> {
    use handlers::{budgets, dashboard, transactions};

    Router::new()
        .route("/budgets", session(state, get(budgets::list)))
        .route(
            "/budgets/:budget_id/transactions",
            session(state, get(transactions::list)),
        )
        .route("/budgets/:budget_id/dashboard", session(state, get(dashboard::get)))
}

fn transaction_routes(state: &AppState) -> Router<AppState> {
    use handlers::transactions;

    Router::new()
        .route(
            "/transactions/:id",
            session(
                state,
                get(transactions::record_get)
                    .patch(transactions::record_patch)
                    .delete(transactions::record_delete),
            ),
        )
        .route("/transactions-simple", session(state, post(transactions::create)))
}

fn device_routes(state: &AppState) -> Router<AppState> {
    use handlers::devices;

    Router::new()
        .route("/devices", session(state, get(devices::list)))
        .route("/devices/register", session(state, post(devices::register)))
        .route("/devices/signout-all", session(state, post(devices::signout_all)))
        .route("/devices/:device_id", session(state, delete(devices::revoke)))
}

fn activity_routes(state: &AppState) -> Router<AppState> {
    use handlers::activity;

    Router::new()
        .route("/notifications", session(state, get(activity::notifications)))
        .route("/audit-events", session(state, get(activity::audit_events)))
}

fn cleanup_routes(state: &AppState) -> Router<AppState> {
    Router::new().route(
        "/cleanup",
        post(handlers::cleanup::post)
            .fallback(method_not_allowed)
            .route_layer(from_fn_with_state(state.clone(), require_service_role)),
    )
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let any_origin = config.security.cors_origins.is_empty()
        || config.security.cors_origins.iter().any(|origin| origin == "*");
    let origins = if any_origin {
        AllowOrigin::from(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(DEVICE_ID_HEADER),
            HeaderName::from_static("apikey"),
            HeaderName::from_static("x-client-info"),
        ])
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

async fn not_found() -> ApiError {
    ApiError::not_found("Not found")
}
