use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use nvlp_api::auth::{AuthProvider, JwtAuth, SupabaseAuth};
use nvlp_api::config::{AppConfig, AuthMode};
use nvlp_api::database::{Backend, DatabaseManager, PgBackend};
use nvlp_api::{router, AppState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so local runs pick up SUPABASE_URL, DATABASE_URL, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("nvlp_api=info,tower_http=info")),
        )
        .init();

    let config = AppConfig::from_env().context("failed to load configuration")?;
    tracing::info!("Starting NVLP API in {:?} mode", config.environment);

    let pool = DatabaseManager::connect_lazy(&config.backend)?;
    let backend: Arc<dyn Backend> = Arc::new(PgBackend::new(pool));

    let auth: Arc<dyn AuthProvider> = match config.security.auth_mode {
        AuthMode::Remote => Arc::new(SupabaseAuth::new(
            config.backend.supabase_url.clone(),
            config.backend.anon_key.clone(),
        )),
        AuthMode::Jwt => Arc::new(JwtAuth::new(&config.backend.jwt_secret)),
    };
    tracing::info!("Token validation mode: {:?}", config.security.auth_mode);

    let bind_addr = config.bind_addr();
    let sweep_every = Duration::from_secs(config.cache.sweep_interval_secs.max(1));
    let state = AppState::new(config, backend, auth);

    let cache = state.cache.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_every);
        loop {
            interval.tick().await;
            let removed = cache.clear_expired();
            if removed > 0 {
                tracing::debug!("Evicted {} expired cache entries", removed);
            }
        }
    });

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("NVLP API listening on http://{}", bind_addr);

    axum::serve(listener, router(state)).await?;
    Ok(())
}
