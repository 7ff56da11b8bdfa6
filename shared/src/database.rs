//! # PostgreSQL Connection Pool
//!
//! Database connection management using sqlx's async connection pool.
//! Sizing follows the rule of thumb `max_connections = (2 * cpu_cores) + disk_spindles`;
//! see [`crate::config::DatabaseConfig`] for the tunable knobs.

use crate::config::DatabaseConfig;
use crate::errors::ApiError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

/// Creates a PostgreSQL connection pool, establishing and testing the
/// minimum connections before returning. Call once at startup.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, ApiError> {
    info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        connect_timeout_seconds = config.connect_timeout_seconds,
        max_lifetime_seconds = config.max_lifetime_seconds,
        "Creating database connection pool"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
        .max_lifetime(Duration::from_secs(config.max_lifetime_seconds))
        .test_before_acquire(true)
        .connect(&config.url)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to create database pool");
            ApiError::DatabaseError(e)
        })?;

    info!("Database connection pool created successfully");

    Ok(pool)
}

/// Verifies database connectivity with a trivial `SELECT 1`.
pub async fn health_check(pool: &PgPool) -> Result<(), ApiError> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(ApiError::DatabaseError)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    // Exercising this module requires a live Postgres instance; covered by
    // the deployment's integration suite, not unit tests here.
}
