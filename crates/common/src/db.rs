use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::config::AppConfig;

/// Create the PostgreSQL connection pool for the dispatch workload.
///
/// Sizing and acquire timeout come from configuration. Each concurrent pass
/// holds at most one connection for the claim statement plus one per event
/// finalization, so `db_max_connections` bounds claim contention directly.
pub async fn create_pool(config: &AppConfig) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(std::time::Duration::from_secs(
            config.db_acquire_timeout_secs,
        ))
        .connect(&config.database_url)
        .await?;

    tracing::info!(
        max_connections = config.db_max_connections,
        acquire_timeout_secs = config.db_acquire_timeout_secs,
        "Connected to PostgreSQL"
    );
    Ok(pool)
}
