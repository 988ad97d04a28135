use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use tracing::info;

use super::DatabaseError;
use crate::config::BackendConfig;

/// Builds the connection pool for the managed Postgres instance.
///
/// The pool connects lazily so the server can start (and report a degraded
/// `/health`) while the database is still coming up.
pub struct DatabaseManager;

impl DatabaseManager {
    pub fn connect_lazy(config: &BackendConfig) -> Result<PgPool, DatabaseError> {
        let url = Self::validated_url(&config.database_url)?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
            .connect_lazy(url.as_str())?;

        info!(
            "Configured database pool for {} (max {} connections)",
            Self::redacted(&url),
            config.max_connections
        );
        Ok(pool)
    }

    fn validated_url(raw: &str) -> Result<url::Url, DatabaseError> {
        let url = url::Url::parse(raw)
            .map_err(|e| DatabaseError::InvalidDatabaseUrl(e.to_string()))?;

        match url.scheme() {
            "postgres" | "postgresql" => {}
            other => {
                return Err(DatabaseError::InvalidDatabaseUrl(format!(
                    "unsupported scheme '{}'",
                    other
                )))
            }
        }
        if url.host_str().is_none() {
            return Err(DatabaseError::InvalidDatabaseUrl("missing host".to_string()));
        }
        Ok(url)
    }

    /// Host, port and database name without credentials, for logs.
    fn redacted(url: &url::Url) -> String {
        format!(
            "{}:{}{}",
            url.host_str().unwrap_or("unknown"),
            url.port().unwrap_or(5432),
            url.path()
        )
    }
}
