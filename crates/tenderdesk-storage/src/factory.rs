use std::sync::Arc;

use tenderdesk_core::StorageConfig;

use crate::{LocalStorage, Storage, StorageResult};

/// Create the storage backend described by configuration.
pub async fn create_storage(config: &StorageConfig) -> StorageResult<Arc<dyn Storage>> {
    let storage = LocalStorage::new(&config.local_path, config.base_url.clone()).await?;
    tracing::info!(path = %config.local_path, "Using local storage backend");
    Ok(Arc::new(storage))
}
