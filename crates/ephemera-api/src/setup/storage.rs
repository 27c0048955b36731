//! Storage setup and initialization

use anyhow::{Context, Result};
use ephemera_core::Config;
use ephemera_storage::{create_storage, ObjectStore};
use std::sync::Arc;

/// Create the object store and verify it is usable before serving traffic.
pub async fn setup_storage(config: &Config) -> Result<Arc<dyn ObjectStore>> {
    tracing::info!(path = %config.upload_dir.display(), "Initializing storage...");

    let store = create_storage(config)
        .await
        .with_context(|| format!("Failed to prepare {}", config.upload_dir.display()))?;

    store
        .health_check()
        .await
        .context("Storage health check failed")?;

    Ok(store)
}
