//! Error types for table log operations.

use common::StorageError;

/// Errors raised by the table log.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Construction arguments or configuration are missing or empty.
    #[error("configuration error: {0}")]
    Config(String),

    /// A record could not be projected to or from a row.
    #[error("mapping error: {0}")]
    Mapping(String),

    /// A caller-supplied value is out of range.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The row keys collided with an existing row.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The backing store failed.
    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict(msg) => Error::Conflict(msg),
            StorageError::NotFound(msg) | StorageError::Storage(msg) => Error::Storage(msg),
            StorageError::Internal(msg) => Error::Internal(msg),
        }
    }
}

/// Result type alias for table log operations.
pub type Result<T> = std::result::Result<T, Error>;
