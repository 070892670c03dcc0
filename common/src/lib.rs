//! Partitioned-row table store shared by the table log crates.
//!
//! A table holds rows addressed by a partition key and a row key, each
//! carrying a timestamp and a set of typed columns. [`TableStore`] is the
//! capability the logging layer is written against; [`storage::factory`]
//! builds one from a [`StorageConfig`].

pub mod clock;
pub mod entity;
pub mod filter;
pub mod serde;
pub mod storage;
pub mod util;

pub use clock::{Clock, MockClock, SystemClock};
pub use entity::{EdmType, EntityProperty, TableRow};
pub use filter::{Comparison, Filter};
pub use storage::config::StorageConfig;
pub use storage::factory::create_table_store;
pub use storage::{StorageError, StorageResult, TableStore};
pub use util::BytesRange;
