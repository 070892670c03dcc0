use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use slatedb::{Db, WriteBatch};
use tokio::sync::Mutex;

use crate::entity::TableRow;
use crate::filter::Filter;
use crate::serde::key::{RowStorageKey, TableKey};
use crate::serde::row;
use crate::storage::{StorageError, StorageResult, TableStore};
use crate::util::BytesRange;

/// SlateDB-backed implementation of [`TableStore`].
///
/// SlateDB is an embedded key-value store built on object storage. Rows are
/// stored under [`RowStorageKey`]s, so a partition is one contiguous key
/// range in row-key order. Several stores (one per table) may share a `Db`.
///
/// SlateDB has no conditional put, so inserts and deletes are serialized
/// through a per-store lock around a read-then-write. This gives
/// first-writer-wins semantics for writers within the process only.
pub struct SlateDbTableStore {
    db: Arc<Db>,
    table: String,
    write_lock: Mutex<()>,
}

impl SlateDbTableStore {
    /// Creates a store for `table` on top of an open SlateDB database.
    pub fn new(db: Arc<Db>, table: impl Into<String>) -> Self {
        Self {
            db,
            table: table.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn ensure_table(&self) -> StorageResult<()> {
        let marker = self
            .db
            .get(TableKey::new(&self.table).serialize())
            .await
            .map_err(StorageError::from_storage)?;
        match marker {
            Some(_) => Ok(()),
            None => Err(StorageError::NotFound(format!(
                "table '{}' does not exist",
                self.table
            ))),
        }
    }

    async fn scan(&self, range: BytesRange, filter: &Filter) -> StorageResult<Vec<TableRow>> {
        let mut iter = self
            .db
            .scan(range)
            .await
            .map_err(StorageError::from_storage)?;

        let mut rows = Vec::new();
        while let Some(entry) = iter.next().await.map_err(StorageError::from_storage)? {
            let key = RowStorageKey::deserialize(&entry.key)?;
            let row = row::deserialize(key.partition_key, key.row_key, &entry.value)?;
            if filter.matches(&row) {
                rows.push(row);
            }
        }
        Ok(rows)
    }
}

#[async_trait]
impl TableStore for SlateDbTableStore {
    fn table_name(&self) -> &str {
        &self.table
    }

    #[tracing::instrument(level = "trace", skip_all)]
    async fn create_if_not_exists(&self) -> StorageResult<()> {
        let _guard = self.write_lock.lock().await;
        let key = TableKey::new(&self.table).serialize();
        let existing = self
            .db
            .get(&key)
            .await
            .map_err(StorageError::from_storage)?;
        if existing.is_none() {
            let mut batch = WriteBatch::new();
            batch.put(key, Bytes::new());
            self.db
                .write(batch)
                .await
                .map_err(StorageError::from_storage)?;
            tracing::debug!(table = %self.table, "created table");
        }
        Ok(())
    }

    #[tracing::instrument(level = "trace", skip_all)]
    async fn insert(&self, row: &TableRow) -> StorageResult<()> {
        let value = row::serialize(row)?;
        let key = RowStorageKey::new(&self.table, &row.partition_key, &row.row_key).serialize();

        let _guard = self.write_lock.lock().await;
        self.ensure_table().await?;
        let existing = self
            .db
            .get(&key)
            .await
            .map_err(StorageError::from_storage)?;
        if existing.is_some() {
            return Err(StorageError::Conflict(format!(
                "row ({}, {}) already exists in '{}'",
                row.partition_key, row.row_key, self.table
            )));
        }

        let mut batch = WriteBatch::new();
        batch.put(key, value);
        self.db
            .write(batch)
            .await
            .map_err(StorageError::from_storage)?;
        Ok(())
    }

    #[tracing::instrument(level = "trace", skip_all)]
    async fn retrieve(
        &self,
        partition_key: &str,
        row_key: &str,
    ) -> StorageResult<Option<TableRow>> {
        self.ensure_table().await?;
        let key = RowStorageKey::new(&self.table, partition_key, row_key).serialize();
        let value = self
            .db
            .get(&key)
            .await
            .map_err(StorageError::from_storage)?;
        match value {
            Some(v) => Ok(Some(row::deserialize(
                partition_key.to_string(),
                row_key.to_string(),
                &v,
            )?)),
            None => Ok(None),
        }
    }

    #[tracing::instrument(level = "trace", skip_all)]
    async fn query(&self, filter: &Filter) -> StorageResult<Vec<TableRow>> {
        self.ensure_table().await?;
        let range = match filter.pinned_partition_key() {
            Some(pk) => RowStorageKey::partition_range(&self.table, pk),
            None => RowStorageKey::table_range(&self.table),
        };
        self.scan(range, filter).await
    }

    #[tracing::instrument(level = "trace", skip_all)]
    async fn delete(&self, partition_key: &str, row_key: &str) -> StorageResult<()> {
        let key = RowStorageKey::new(&self.table, partition_key, row_key).serialize();

        let _guard = self.write_lock.lock().await;
        self.ensure_table().await?;
        let existing = self
            .db
            .get(&key)
            .await
            .map_err(StorageError::from_storage)?;
        if existing.is_none() {
            return Err(StorageError::NotFound(format!(
                "row ({}, {}) does not exist in '{}'",
                partition_key, row_key, self.table
            )));
        }

        let mut batch = WriteBatch::new();
        batch.delete(key);
        self.db
            .write(batch)
            .await
            .map_err(StorageError::from_storage)?;
        Ok(())
    }
}
