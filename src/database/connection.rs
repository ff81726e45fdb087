use crate::config::DatabaseConfig;
use crate::error::{BeaconError, BeaconResult};
use crate::logging::redact_url;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::info;

/// Build the connection pool and verify it with one round trip.
pub async fn connect(config: &DatabaseConfig) -> BeaconResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout())
        .connect(&config.url)
        .await
        .map_err(|e| {
            BeaconError::DatabaseError(format!(
                "failed to connect to {}: {e}",
                redact_url(&config.url)
            ))
        })?;

    info!(
        url = %redact_url(&config.url),
        max_connections = config.max_connections,
        "PostgreSQL pool established"
    );
    Ok(pool)
}

pub async fn health_check(pool: &PgPool) -> BeaconResult<bool> {
    let row = sqlx::query("SELECT 1 AS health").fetch_one(pool).await?;
    let health: i32 = row.try_get("health")?;
    Ok(health == 1)
}

/// Apply the embedded schema migrations.
pub async fn run_migrations(pool: &PgPool) -> BeaconResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| BeaconError::DatabaseError(format!("migration failed: {e}")))?;
    info!("Database migrations applied");
    Ok(())
}
