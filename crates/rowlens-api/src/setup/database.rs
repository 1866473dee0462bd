//! Database setup and initialization

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use rowlens_core::Config;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

/// Connect the pool and apply the schema.
pub async fn setup_database(config: &Config) -> Result<SqlitePool> {
    tracing::info!(database_url = %config.database_url, "Connecting to database...");

    let options = SqliteConnectOptions::from_str(&config.database_url)
        .context("Invalid DATABASE_URL")?
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_timeout_seconds))
        .connect_with(options)
        .await
        .context("Failed to connect to database")?;

    rowlens_db::init_schema(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to apply database schema: {}", e))?;

    tracing::info!(
        max_connections = config.db_max_connections,
        "Database connected and schema applied"
    );

    Ok(pool)
}
