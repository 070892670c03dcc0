//! The table store capability.
//!
//! [`TableStore`] is the boundary between the logging layer and whatever
//! persists rows. A store is bound to a single table and offers
//! create-if-missing, conditional insert, point lookup, filtered query and
//! delete, all keyed by partition key and row key.

pub mod config;
pub mod factory;
pub mod in_memory;
pub mod slate;

use async_trait::async_trait;

use crate::entity::TableRow;
use crate::filter::Filter;

/// Errors raised by table stores.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// A row with the same partition key and row key already exists.
    #[error("conflict (409): {0}")]
    Conflict(String),

    /// The addressed table or row does not exist.
    #[error("not found (404): {0}")]
    NotFound(String),

    /// The backend failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// An invariant of the store was violated.
    #[error("internal error: {0}")]
    Internal(String),
}

impl StorageError {
    /// Wraps a backend error.
    pub fn from_storage(e: impl std::fmt::Display) -> Self {
        StorageError::Storage(e.to_string())
    }

    /// Returns true for the insert collision signal.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StorageError::Conflict(_))
    }
}

/// Result type for table store operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// A single table of a partitioned-row store.
///
/// Implementations must be safe to share across tasks. `insert` must be
/// conditional: when a row with the same keys exists, the first writer wins
/// and later writers receive [`StorageError::Conflict`].
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Name of the table this store is bound to.
    fn table_name(&self) -> &str;

    /// Creates the table unless it already exists. Idempotent.
    async fn create_if_not_exists(&self) -> StorageResult<()>;

    /// Inserts a new row.
    async fn insert(&self, row: &TableRow) -> StorageResult<()>;

    /// Looks up a row by its keys.
    async fn retrieve(&self, partition_key: &str, row_key: &str)
    -> StorageResult<Option<TableRow>>;

    /// Returns every row matching `filter`, ordered by partition key then
    /// row key.
    async fn query(&self, filter: &Filter) -> StorageResult<Vec<TableRow>>;

    /// Deletes a row. Fails with [`StorageError::NotFound`] when absent.
    async fn delete(&self, partition_key: &str, row_key: &str) -> StorageResult<()>;
}
