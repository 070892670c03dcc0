use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::entity::TableRow;
use crate::filter::Filter;
use crate::storage::{StorageError, StorageResult, TableStore};

type Rows = BTreeMap<(String, String), TableRow>;

/// In-memory implementation of [`TableStore`].
///
/// Rows live in a `BTreeMap` keyed by `(partition_key, row_key)`, so queries
/// come back in key order. The table only accepts writes once
/// [`create_if_not_exists`](TableStore::create_if_not_exists) has run.
pub struct InMemoryTableStore {
    table: String,
    rows: RwLock<Option<Rows>>,
}

impl InMemoryTableStore {
    /// Creates a store for `table`. The table itself is not created yet.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            rows: RwLock::new(None),
        }
    }

    /// Number of rows currently stored.
    pub async fn len(&self) -> usize {
        self.rows.read().await.as_ref().map_or(0, BTreeMap::len)
    }

    /// Returns true if the table holds no rows.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn missing_table(&self) -> StorageError {
        StorageError::NotFound(format!("table '{}' does not exist", self.table))
    }
}

#[async_trait]
impl TableStore for InMemoryTableStore {
    fn table_name(&self) -> &str {
        &self.table
    }

    async fn create_if_not_exists(&self) -> StorageResult<()> {
        let mut rows = self.rows.write().await;
        if rows.is_none() {
            *rows = Some(BTreeMap::new());
        }
        Ok(())
    }

    async fn insert(&self, row: &TableRow) -> StorageResult<()> {
        let mut guard = self.rows.write().await;
        let rows = guard.as_mut().ok_or_else(|| self.missing_table())?;
        let key = (row.partition_key.clone(), row.row_key.clone());
        if rows.contains_key(&key) {
            return Err(StorageError::Conflict(format!(
                "row ({}, {}) already exists in '{}'",
                row.partition_key, row.row_key, self.table
            )));
        }
        rows.insert(key, row.clone());
        Ok(())
    }

    async fn retrieve(
        &self,
        partition_key: &str,
        row_key: &str,
    ) -> StorageResult<Option<TableRow>> {
        let guard = self.rows.read().await;
        let rows = guard.as_ref().ok_or_else(|| self.missing_table())?;
        Ok(rows
            .get(&(partition_key.to_string(), row_key.to_string()))
            .cloned())
    }

    async fn query(&self, filter: &Filter) -> StorageResult<Vec<TableRow>> {
        let guard = self.rows.read().await;
        let rows = guard.as_ref().ok_or_else(|| self.missing_table())?;
        Ok(rows
            .values()
            .filter(|row| filter.matches(row))
            .cloned()
            .collect())
    }

    async fn delete(&self, partition_key: &str, row_key: &str) -> StorageResult<()> {
        let mut guard = self.rows.write().await;
        let rows = guard.as_mut().ok_or_else(|| self.missing_table())?;
        match rows.remove(&(partition_key.to_string(), row_key.to_string())) {
            Some(_) => Ok(()),
            None => Err(StorageError::NotFound(format!(
                "row ({}, {}) does not exist in '{}'",
                partition_key, row_key, self.table
            ))),
        }
    }
}
