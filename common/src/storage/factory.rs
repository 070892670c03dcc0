//! Creates table stores from configuration.

use std::sync::Arc;

use slatedb::DbBuilder;
use slatedb::config::Settings;
use slatedb::object_store;

use super::config::{ObjectStoreConfig, SlateDbStorageConfig, StorageConfig};
use super::in_memory::InMemoryTableStore;
use super::slate::SlateDbTableStore;
use super::{StorageError, StorageResult, TableStore};

/// Creates a store bound to `table` on the backend `config` selects.
///
/// The table itself is not created; call
/// [`TableStore::create_if_not_exists`] before writing.
///
/// ```rust,ignore
/// use common::storage::config::StorageConfig;
/// use common::storage::factory::create_table_store;
///
/// let config = StorageConfig::from_connection_string("UseDevelopmentStorage=true")?;
/// let store = create_table_store(&config, "requestlogs").await?;
/// store.create_if_not_exists().await?;
/// ```
pub async fn create_table_store(
    config: &StorageConfig,
    table: &str,
) -> StorageResult<Arc<dyn TableStore>> {
    match config {
        StorageConfig::InMemory => Ok(Arc::new(InMemoryTableStore::new(table))),
        StorageConfig::SlateDb(slate_config) => {
            let store = create_slatedb_store(slate_config, table).await?;
            Ok(Arc::new(store))
        }
    }
}

async fn create_slatedb_store(
    config: &SlateDbStorageConfig,
    table: &str,
) -> StorageResult<SlateDbTableStore> {
    let object_store: Arc<dyn object_store::ObjectStore> = match &config.object_store {
        ObjectStoreConfig::InMemory => Arc::new(object_store::memory::InMemory::new()),
        ObjectStoreConfig::Aws(aws_config) => {
            let store = object_store::aws::AmazonS3Builder::new()
                .with_region(&aws_config.region)
                .with_bucket_name(&aws_config.bucket)
                .build()
                .map_err(|e| {
                    StorageError::Storage(format!("Failed to create AWS S3 store: {}", e))
                })?;
            Arc::new(store)
        }
        ObjectStoreConfig::Local(local_config) => {
            std::fs::create_dir_all(&local_config.path).map_err(|e| {
                StorageError::Storage(format!(
                    "Failed to create storage directory '{}': {}",
                    local_config.path, e
                ))
            })?;
            let store = object_store::local::LocalFileSystem::new_with_prefix(&local_config.path)
                .map_err(|e| {
                    StorageError::Storage(format!(
                        "Failed to create local filesystem store: {}",
                        e
                    ))
                })?;
            Arc::new(store)
        }
    };

    let settings = match &config.settings_path {
        Some(path) => Settings::from_file(path).map_err(|e| {
            StorageError::Storage(format!(
                "Failed to load SlateDB settings from {}: {}",
                path, e
            ))
        })?,
        None => Settings::load().unwrap_or_default(),
    };

    let db = DbBuilder::new(config.path.clone(), object_store)
        .with_settings(settings)
        .build()
        .await
        .map_err(|e| StorageError::Storage(format!("Failed to create SlateDB: {}", e)))?;
    tracing::info!(path = %config.path, table, "opened SlateDB table store");

    Ok(SlateDbTableStore::new(Arc::new(db), table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::TableRow;

    #[tokio::test]
    async fn should_create_in_memory_store_for_table() {
        // given
        let config = StorageConfig::InMemory;

        // when
        let store = create_table_store(&config, "requestlogs").await.unwrap();

        // then
        assert_eq!(store.table_name(), "requestlogs");
    }

    #[tokio::test]
    async fn should_create_usable_slatedb_store() {
        // given
        let config = StorageConfig::SlateDb(SlateDbStorageConfig::default());

        // when
        let store = create_table_store(&config, "requestlogs").await.unwrap();
        store.create_if_not_exists().await.unwrap();
        store
            .insert(&TableRow::new("pk", "1", chrono::Utc::now()))
            .await
            .unwrap();

        // then
        assert!(store.retrieve("pk", "1").await.unwrap().is_some());
    }
}
