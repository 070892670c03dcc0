//! Byte-level encodings used by the persistent table store.
//!
//! Keys are designed so that lexicographic byte order matches
//! `(table, partition key, row key)` order, which lets a single range scan
//! cover one partition. Values carry the row timestamp and typed columns.

pub mod key;
pub mod row;
pub mod terminated_bytes;

/// Error returned when stored bytes cannot be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeserializeError {
    pub message: String,
}

impl DeserializeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for DeserializeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "deserialize error: {}", self.message)
    }
}

impl std::error::Error for DeserializeError {}

impl From<DeserializeError> for crate::StorageError {
    fn from(err: DeserializeError) -> Self {
        crate::StorageError::Internal(err.message)
    }
}
