/// Database access layer
///
/// This module provides:
/// - Database connection pooling
/// - The record repository (trait + PostgreSQL implementation)
/// - Embedded schema migrations
use crate::config::DatabaseConfig;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

pub mod record_repo;

pub use record_repo::{PgRecordRepository, RecordRepository};

/// Create the shared connection pool and verify it with a round trip
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections.min(config.max_connections))
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
        .test_before_acquire(true)
        .connect(&config.url)
        .await?;

    sqlx::query("SELECT 1").execute(&pool).await?;

    info!(
        max_connections = config.max_connections,
        "Database pool created and verified"
    );

    Ok(pool)
}

/// Apply the embedded migrations under `migrations/`
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
