//! Application setup and initialization
//!
//! All startup logic lives here rather than in main.rs: telemetry, database
//! pool and schema, storage directory, state, and routes.

pub mod database;
pub mod routes;
pub mod server;

use std::sync::Arc;

use anyhow::{Context, Result};
use rowlens_core::Config;
use rowlens_db::FileRepository;
use rowlens_storage::LocalStorage;

use crate::state::AppState;

/// Initialize the entire application.
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    crate::telemetry::init_telemetry()
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!(
        environment = %config.environment,
        upload_folder = %config.upload_folder.display(),
        max_file_size_mb = config.max_file_size_mb(),
        "Configuration loaded"
    );

    let pool = database::setup_database(&config).await?;

    let storage = LocalStorage::new(&config.upload_folder)
        .await
        .context("Failed to initialize upload storage")?;

    let state = Arc::new(AppState {
        config: config.clone(),
        files: FileRepository::new(pool),
        storage: Arc::new(storage),
    });

    let router = routes::build_router(state.clone())?;

    Ok((state, router))
}
