//! Table Log - request/response logging on a partitioned-row table store.
//!
//! Records are tracked as rows of a table addressed by a partition key and a
//! row key. Two record fields are designated by name as the partition-key
//! and row-key fields; every other field is stored as a typed column.
//!
//! # Key Concepts
//!
//! - **LogRecord**: a record type that can enumerate and assign its fields by
//!   name, usually implemented with [`log_record!`].
//! - **Inverted time keys**: without a row-key field, the row key is derived
//!   from the current time so that rows within a partition read newest-first.
//! - **Collision retry**: inserts that collide with an existing row bump a
//!   numeric row key and try again, up to five attempts.
//! - **TableLog**: the façade. It reports success as `bool` and lookups as
//!   `Option`, logging the underlying errors.
//!
//! # Example
//!
//! ```ignore
//! use table_log::{Log, TableLog, log_record};
//!
//! #[derive(Default)]
//! struct LogEntry {
//!     log_name: String,
//!     internal_id: String,
//!     request: String,
//! }
//!
//! log_record!(LogEntry {
//!     "LogName" => log_name,
//!     "internal_id" => internal_id,
//!     "request" => request,
//! });
//!
//! let log = TableLog::from_args(&["UseDevelopmentStorage=true", "requestlogs", "LogName", "internal_id"]).await?;
//! log.track(&entry).await;
//! let entry: Option<LogEntry> = log.get_record("TestLog", "1234").await;
//! ```

mod client;
mod config;
pub mod entity;
mod error;
pub mod keys;
mod log;
mod random;
#[cfg(test)]
mod test_utils;

pub use client::{TableClient, day_filter, range_filter};
pub use common::{EntityProperty, TableRow};
pub use config::{Config, RetryConfig, UnsupportedFieldPolicy};
pub use entity::{FieldValue, FromProperty, LogRecord, ToFieldValue};
pub use error::{Error, Result};
pub use keys::{inverted_time_key, time_from_inverted_key};
pub use log::{Log, TableLog};
pub use random::{RandomSource, SeededRandom, ThreadRandom};
