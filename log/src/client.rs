//! Client over a [`TableStore`] with collision-retrying inserts.
//!
//! Every operation returns a [`Result`]; reducing failures to booleans is
//! left to the façade.

use std::sync::Arc;

use chrono::{DateTime, Days, Utc};
use common::{Comparison, Filter, StorageConfig, StorageError, TableRow, TableStore};

use crate::config::RetryConfig;
use crate::error::{Error, Result};
use crate::keys;
use crate::random::{RandomSource, ThreadRandom};

/// Handle to one table.
///
/// Cloning is cheap and clones share the underlying store.
#[derive(Clone)]
pub struct TableClient {
    store: Arc<dyn TableStore>,
    retry: RetryConfig,
    random: Arc<dyn RandomSource>,
}

impl TableClient {
    /// Connects to the store named by `connection_string` and creates
    /// `table_name` if it does not exist yet.
    pub async fn open(
        connection_string: &str,
        table_name: &str,
        retry: RetryConfig,
    ) -> Result<Self> {
        if connection_string.trim().is_empty() {
            return Err(Error::Config("connection string must not be empty".into()));
        }
        if table_name.trim().is_empty() {
            return Err(Error::Config("table name must not be empty".into()));
        }
        retry.validate()?;
        let storage = StorageConfig::from_connection_string(connection_string)
            .map_err(|e| Error::Config(e.to_string()))?;
        let store = common::create_table_store(&storage, table_name).await?;
        Self::with_store(store, retry).await
    }

    /// Wraps an existing store, creating its table if needed.
    pub async fn with_store(store: Arc<dyn TableStore>, retry: RetryConfig) -> Result<Self> {
        store.create_if_not_exists().await?;
        tracing::debug!(table = store.table_name(), "table ready");
        Ok(Self {
            store,
            retry,
            random: Arc::new(ThreadRandom),
        })
    }

    /// Replaces the randomness used for retry jitter.
    pub fn with_random(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = random;
        self
    }

    pub fn table_name(&self) -> &str {
        self.store.table_name()
    }

    /// Inserts `row`, bumping its row key on collisions.
    ///
    /// A conflicting insert is retried while the row key parses as an
    /// integer: by one for the first `linear_attempts` retries and by a
    /// random offset in `[jitter_min, jitter_max)` afterwards, for at most
    /// `max_attempts` attempts overall. On success `row.row_key` holds the
    /// key the row was stored under.
    ///
    /// Fails with [`Error::Conflict`] when the key is not numeric or the
    /// attempts run out, and with the store's error for any other failure.
    #[tracing::instrument(level = "trace", skip_all)]
    pub async fn insert(&self, row: &mut TableRow) -> Result<()> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match self.store.insert(row).await {
                Ok(()) => {
                    tracing::debug!(
                        partition_key = %row.partition_key,
                        row_key = %row.row_key,
                        attempt,
                        "inserted row"
                    );
                    return Ok(());
                }
                Err(err) => err,
            };
            if !err.is_conflict() {
                return Err(err.into());
            }
            if attempt >= self.retry.max_attempts {
                tracing::warn!(
                    partition_key = %row.partition_key,
                    row_key = %row.row_key,
                    attempt,
                    "row key collision, giving up"
                );
                return Err(Error::Conflict(format!(
                    "row key '{}' still collides after {} attempts",
                    row.row_key, attempt
                )));
            }
            let Some(next) = self.bump_row_key(&row.row_key, attempt) else {
                tracing::warn!(
                    partition_key = %row.partition_key,
                    row_key = %row.row_key,
                    attempt,
                    "row key collision on non-numeric key"
                );
                return Err(non_recoverable(err, &row.row_key));
            };
            tracing::warn!(
                partition_key = %row.partition_key,
                row_key = %row.row_key,
                new_row_key = %next,
                attempt,
                "row key collision, retrying"
            );
            row.row_key = next;
        }
    }

    /// Next row key to try after the `retry`-th conflict, or `None` when
    /// `row_key` is not an integer.
    fn bump_row_key(&self, row_key: &str, retry: u32) -> Option<String> {
        let current: i64 = row_key.parse().ok()?;
        let step = if retry <= self.retry.linear_attempts {
            1
        } else {
            self.random
                .next_in_range(self.retry.jitter_min..self.retry.jitter_max)
        };
        let next = current.checked_add(step)?;
        // Zero-padded keys keep their width; signed keys are written plainly.
        if row_key.bytes().all(|b| b.is_ascii_digit()) {
            Some(format!("{:0width$}", next, width = row_key.len()))
        } else {
            Some(next.to_string())
        }
    }

    /// Point lookup of a stored row.
    pub async fn get(&self, partition_key: &str, row_key: &str) -> Result<Option<TableRow>> {
        require_key("partition key", partition_key)?;
        require_key("row key", row_key)?;
        Ok(self.store.retrieve(partition_key, row_key).await?)
    }

    /// Rows of a partition tracked during the UTC day containing `date`.
    pub async fn get_by_day(
        &self,
        partition_key: &str,
        date: DateTime<Utc>,
    ) -> Result<Vec<TableRow>> {
        self.query(&day_filter(partition_key, date)?).await
    }

    /// Rows of a partition tracked strictly between `from` and `to`.
    pub async fn get_by_range(
        &self,
        partition_key: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<TableRow>> {
        self.query(&range_filter(partition_key, from, to)?).await
    }

    /// Rows matching `filter`, in key order.
    pub async fn query(&self, filter: &Filter) -> Result<Vec<TableRow>> {
        tracing::trace!(%filter, "querying table");
        Ok(self.store.query(filter).await?)
    }

    /// Deletes a row if it exists. Returns whether a row was removed.
    pub async fn delete(&self, partition_key: &str, row_key: &str) -> Result<bool> {
        require_key("partition key", partition_key)?;
        require_key("row key", row_key)?;
        if self.store.retrieve(partition_key, row_key).await?.is_none() {
            return Ok(false);
        }
        match self.store.delete(partition_key, row_key).await {
            Ok(()) => Ok(true),
            // Removed concurrently between the lookup and the delete.
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

fn non_recoverable(err: StorageError, row_key: &str) -> Error {
    match err {
        StorageError::Conflict(msg) => Error::Conflict(format!(
            "{}; row key '{}' is not numeric and cannot be bumped",
            msg, row_key
        )),
        other => other.into(),
    }
}

fn require_key(what: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::InvalidInput(format!("{} must not be empty", what)));
    }
    Ok(())
}

fn inverted_key(time: DateTime<Utc>) -> Result<String> {
    keys::ticks(time)
        .map(keys::invert_ticks)
        .ok_or_else(|| Error::InvalidInput(format!("{} is outside the tick range", time)))
}

/// Filter selecting the UTC day containing `date` within a partition.
///
/// Renders as
/// `((RowKey gt '<inverted next midnight>') and (RowKey lt '<inverted midnight>')) and (PartitionKey eq '<pk>')`.
pub fn day_filter(partition_key: &str, date: DateTime<Utc>) -> Result<Filter> {
    let midnight = date.date_naive().and_time(chrono::NaiveTime::MIN).and_utc();
    let next_midnight = midnight
        .checked_add_days(Days::new(1))
        .ok_or_else(|| Error::InvalidInput(format!("no day follows {}", midnight)))?;
    range_filter(partition_key, midnight, next_midnight)
}

/// Filter selecting rows keyed strictly between `from` and `to` within a
/// partition.
pub fn range_filter(
    partition_key: &str,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Filter> {
    require_key("partition key", partition_key)?;
    let upper = inverted_key(from)?;
    let lower = inverted_key(to)?;
    Ok(Filter::row_key(Comparison::GreaterThan, lower)
        .and(Filter::row_key(Comparison::LessThan, upper))
        .and(Filter::partition_key(Comparison::Equal, partition_key)))
}
