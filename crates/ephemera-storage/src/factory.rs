use crate::{LocalStorage, ObjectStore, StorageResult};
use ephemera_core::Config;
use std::sync::Arc;

/// Create the object store described by configuration
pub async fn create_storage(config: &Config) -> StorageResult<Arc<dyn ObjectStore>> {
    let storage = LocalStorage::new(config.upload_dir.clone()).await?;

    tracing::info!(
        path = %storage.base_path().display(),
        "Local storage initialized"
    );

    Ok(Arc::new(storage))
}
