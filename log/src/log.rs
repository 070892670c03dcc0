//! The logging façade.
//!
//! [`TableLog`] projects records into rows and inserts them through a
//! [`TableClient`]. Its public surface never returns errors: failures are
//! logged and reported as `false` or `None`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::clock::{Clock, SystemClock};
use common::TableRow;
use tokio::runtime::{Handle, RuntimeFlavor};

use crate::client::TableClient;
use crate::config::{Config, UnsupportedFieldPolicy};
use crate::entity::{self, LogRecord};
use crate::error::Result;

/// A sink for log records.
#[async_trait]
pub trait Log: Send + Sync {
    /// Stores `record`, returning whether it was written.
    async fn track(&self, record: &dyn LogRecord) -> bool;

    /// Blocking form of [`track`](Log::track).
    ///
    /// Inside a multi-threaded runtime the worker thread is handed off while
    /// blocking. Inside a current-thread runtime blocking would deadlock, so
    /// the call fails and returns `false`.
    fn track_blocking(&self, record: &dyn LogRecord) -> bool;
}

/// A log stored in a partitioned table.
///
/// Each tracked record becomes one row. The configured partition-key field
/// supplies the partition key; the row-key field, if configured, supplies
/// the row key, and otherwise the row key is an inverted time key so that
/// each partition reads newest-first.
///
/// # Example
///
/// ```ignore
/// use table_log::{Log, TableLog};
///
/// let log = TableLog::from_args(&["UseDevelopmentStorage=true", "requestlogs", "LogName"]).await?;
/// assert!(log.track(&entry).await);
/// let today = log.get_by_day("TestLog", chrono::Utc::now()).await;
/// ```
pub struct TableLog {
    client: TableClient,
    partition_key_field: String,
    row_key_field: Option<String>,
    unsupported_fields: UnsupportedFieldPolicy,
    clock: Arc<dyn Clock>,
}

impl TableLog {
    /// Opens the table named by `config`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) for missing settings
    /// and a storage error if the table cannot be created.
    pub async fn open(config: Config) -> Result<Self> {
        config.validate()?;
        let client = TableClient::open(
            &config.connection_string,
            &config.table_name,
            config.retry.clone(),
        )
        .await?;
        tracing::info!(
            table = %config.table_name,
            partition_key_field = %config.partition_key_field,
            row_key_field = config.row_key_field().unwrap_or("<generated>"),
            "opened table log"
        );
        Ok(Self::new(client, &config))
    }

    /// Opens a log from positional arguments, see [`Config::from_args`].
    pub async fn from_args<S: AsRef<str>>(args: &[S]) -> Result<Self> {
        Self::open(Config::from_args(args)?).await
    }

    /// Builds a log over an existing client, taking the key fields and
    /// projection policy from `config`.
    pub fn new(client: TableClient, config: &Config) -> Self {
        Self {
            client,
            partition_key_field: config.partition_key_field.clone(),
            row_key_field: config.row_key_field().map(str::to_string),
            unsupported_fields: config.unsupported_fields,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the clock used for row timestamps and generated row keys.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn client(&self) -> &TableClient {
        &self.client
    }

    fn project(&self, record: &dyn LogRecord) -> Result<TableRow> {
        entity::project(
            &self.partition_key_field,
            self.row_key_field.as_deref(),
            record,
            self.clock.utc_now(),
            self.unsupported_fields,
        )
    }

    async fn try_track(&self, record: &dyn LogRecord) -> Result<()> {
        let mut row = self.project(record)?;
        self.client.insert(&mut row).await
    }

    /// Looks up a row by the keys as the record carried them.
    ///
    /// Returns `None` both when no row matches and when the lookup fails.
    pub async fn get(&self, partition_key: &str, row_key: &str) -> Option<TableRow> {
        let result = self
            .client
            .get(&entity::encode(partition_key), &entity::encode(row_key))
            .await
            .and_then(|row| row.map(decoded).transpose());
        log_failure("get", result).flatten()
    }

    /// Looks up a row and maps it back into a record of type `R`.
    pub async fn get_record<R: LogRecord + Default>(
        &self,
        partition_key: &str,
        row_key: &str,
    ) -> Option<R> {
        let row = self
            .client
            .get(&entity::encode(partition_key), &entity::encode(row_key))
            .await;
        let row = log_failure("get_record", row).flatten()?;
        entity::to_record(&row, &self.partition_key_field, self.row_key_field.as_deref())
    }

    /// Rows of a partition tracked during the UTC day containing `date`,
    /// newest first.
    pub async fn get_by_day(&self, partition_key: &str, date: DateTime<Utc>) -> Option<Vec<TableRow>> {
        let rows = self
            .client
            .get_by_day(&entity::encode(partition_key), date)
            .await
            .and_then(decoded_all);
        log_failure("get_by_day", rows)
    }

    /// Rows of a partition tracked strictly between `from` and `to`, newest
    /// first.
    pub async fn get_by_range(
        &self,
        partition_key: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Option<Vec<TableRow>> {
        let rows = self
            .client
            .get_by_range(&entity::encode(partition_key), from, to)
            .await
            .and_then(decoded_all);
        log_failure("get_by_range", rows)
    }

    /// Deletes a row if present.
    ///
    /// Returns `true` whether or not a row existed, and `false` only when
    /// the store failed.
    pub async fn untrack(&self, partition_key: &str, row_key: &str) -> bool {
        let result = self
            .client
            .delete(&entity::encode(partition_key), &entity::encode(row_key))
            .await;
        log_failure("untrack", result).is_some()
    }
}

#[async_trait]
impl Log for TableLog {
    async fn track(&self, record: &dyn LogRecord) -> bool {
        log_failure("track", self.try_track(record).await).is_some()
    }

    fn track_blocking(&self, record: &dyn LogRecord) -> bool {
        match Handle::try_current() {
            Ok(handle) => match handle.runtime_flavor() {
                RuntimeFlavor::MultiThread => {
                    tokio::task::block_in_place(|| handle.block_on(self.track(record)))
                }
                flavor => {
                    tracing::error!(
                        ?flavor,
                        "track_blocking called from a runtime that cannot block"
                    );
                    false
                }
            },
            Err(_) => match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime.block_on(self.track(record)),
                Err(e) => {
                    tracing::error!(error = %e, "failed to start runtime for track_blocking");
                    false
                }
            },
        }
    }
}

fn decoded(mut row: TableRow) -> Result<TableRow> {
    entity::decode_row(&mut row)?;
    Ok(row)
}

fn decoded_all(rows: Vec<TableRow>) -> Result<Vec<TableRow>> {
    rows.into_iter().map(decoded).collect()
}

fn log_failure<T>(operation: &'static str, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::error!(operation, error = %e, "table log operation failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use common::MockClock;

    use super::*;
    use crate::config::RetryConfig;
    use crate::keys;
    use crate::test_utils::{InsertBehavior, StubStore};

    #[derive(Debug, Default, Clone, PartialEq)]
    struct LogEntry {
        log_name: String,
        internal_id: String,
        request: String,
        internal_parameters: String,
        request_time: DateTime<Utc>,
        response: String,
        response_time: DateTime<Utc>,
    }

    crate::log_record!(LogEntry {
        "LogName" => log_name,
        "internal_id" => internal_id,
        "request" => request,
        "internal_parameters" => internal_parameters,
        "requestTime" => request_time,
        "response" => response,
        "responseTime" => response_time,
    });

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2016, 4, 1, 10, 30, 0).unwrap()
    }

    fn entry(id: &str) -> LogEntry {
        LogEntry {
            log_name: "Test Log".into(),
            internal_id: id.into(),
            request: "myrequest".into(),
            internal_parameters: r#"{"a": 1}"#.into(),
            request_time: now() - Duration::seconds(2),
            response: "myresponse".into(),
            response_time: now() - Duration::seconds(1),
        }
    }

    fn config(row_key_field: Option<&str>) -> Config {
        Config {
            connection_string: "UseDevelopmentStorage=true".into(),
            table_name: "stub".into(),
            partition_key_field: "LogName".into(),
            row_key_field: row_key_field.map(str::to_string),
            retry: RetryConfig::default(),
            unsupported_fields: UnsupportedFieldPolicy::Drop,
        }
    }

    async fn log_with(
        behavior: InsertBehavior,
        row_key_field: Option<&str>,
    ) -> (TableLog, Arc<StubStore>, Arc<MockClock>) {
        let store = Arc::new(StubStore::new(behavior).await);
        let client = TableClient::with_store(store.clone(), RetryConfig::default())
            .await
            .unwrap();
        let clock = Arc::new(MockClock::at(now()));
        let log = TableLog::new(client, &config(row_key_field)).with_clock(clock.clone());
        (log, store, clock)
    }

    #[tokio::test]
    async fn should_track_and_get_with_explicit_keys() {
        // given
        let (log, _store, _clock) = log_with(InsertBehavior::Normal, Some("internal_id")).await;
        let entry = entry("1234");

        // when
        let tracked = log.track(&entry).await;
        let row = log.get("Test Log", "1234").await;

        // then
        assert!(tracked);
        let row = row.unwrap();
        assert_eq!(row.partition_key, "Test Log");
        assert_eq!(row.row_key, "1234");
        assert_eq!(row.timestamp, now());
        assert_eq!(
            row.property("internal_parameters"),
            Some(&common::EntityProperty::String(r#"{"a": 1}"#.into()))
        );
    }

    #[tokio::test]
    async fn should_round_trip_record() {
        // given
        let (log, _store, _clock) = log_with(InsertBehavior::Normal, Some("internal_id")).await;
        let entry = entry("1234");
        assert!(log.track(&entry).await);

        // when
        let restored: Option<LogEntry> = log.get_record("Test Log", "1234").await;

        // then
        assert_eq!(restored, Some(entry));
    }

    #[tokio::test]
    async fn should_generate_row_key_from_clock() {
        // given
        let (log, store, clock) = log_with(InsertBehavior::Normal, None).await;

        // when
        assert!(log.track(&entry("1")).await);
        clock.advance(std::time::Duration::from_secs(1));
        assert!(log.track(&entry("2")).await);

        // then
        let keys_tried = store.attempted_row_keys();
        assert_eq!(keys_tried[0], keys::inverted_time_key(now()).unwrap());
        assert!(keys_tried[1] < keys_tried[0]);
    }

    #[tokio::test]
    async fn should_retry_same_instant_tracks() {
        // given
        let (log, store, _clock) = log_with(InsertBehavior::Normal, None).await;

        // when
        let first = log.track(&entry("1")).await;
        let second = log.track(&entry("2")).await;

        // then
        assert!(first && second);
        assert_eq!(store.insert_calls(), 3);
        let rows = log.get_by_day("Test Log", now()).await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn should_return_false_when_insert_fails() {
        let (log, _store, _clock) = log_with(InsertBehavior::Fail, Some("internal_id")).await;
        assert!(!log.track(&entry("1234")).await);
    }

    #[tokio::test]
    async fn should_return_false_on_non_numeric_collision() {
        // given
        let (log, store, _clock) = log_with(InsertBehavior::AlwaysConflict, Some("internal_id")).await;

        // when
        let tracked = log.track(&entry("req-1")).await;

        // then
        assert!(!tracked);
        assert_eq!(store.insert_calls(), 1);
    }

    #[tokio::test]
    async fn should_return_false_when_key_field_missing() {
        // given
        let store = Arc::new(StubStore::new(InsertBehavior::Normal).await);
        let client = TableClient::with_store(store.clone(), RetryConfig::default())
            .await
            .unwrap();
        let mut config = config(None);
        config.partition_key_field = "Tenant".into();
        let log = TableLog::new(client, &config);

        // when
        let tracked = log.track(&entry("1")).await;

        // then
        assert!(!tracked);
        assert_eq!(store.insert_calls(), 0);
    }

    #[tokio::test]
    async fn should_return_none_when_reads_fail() {
        // given
        let (log, store, _clock) = log_with(InsertBehavior::Normal, Some("internal_id")).await;
        assert!(log.track(&entry("1234")).await);
        store.fail_reads();

        // when/then
        assert_eq!(log.get("Test Log", "1234").await, None);
        assert_eq!(log.get_record::<LogEntry>("Test Log", "1234").await, None);
        assert_eq!(log.get_by_day("Test Log", now()).await, None);
        assert!(!log.untrack("Test Log", "1234").await);
    }

    #[tokio::test]
    async fn should_return_none_for_missing_row() {
        let (log, _store, _clock) = log_with(InsertBehavior::Normal, Some("internal_id")).await;
        assert_eq!(log.get("Test Log", "404").await, None);
        assert_eq!(log.get("", "404").await, None);
    }

    #[tokio::test]
    async fn should_untrack_idempotently() {
        // given
        let (log, store, _clock) = log_with(InsertBehavior::Normal, Some("internal_id")).await;
        assert!(log.track(&entry("1234")).await);

        // when
        let first = log.untrack("Test Log", "1234").await;
        let second = log.untrack("Test Log", "1234").await;

        // then
        assert!(first && second);
        assert_eq!(store.delete_calls(), 1);
        assert_eq!(log.get("Test Log", "1234").await, None);
    }

    #[tokio::test]
    async fn should_query_day_with_encoded_partition_key() {
        // given
        let (log, store, _clock) = log_with(InsertBehavior::Normal, None).await;
        assert!(log.track(&entry("1")).await);

        // when
        let rows = log.get_by_day("Test Log", now()).await.unwrap();

        // then
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].partition_key, "Test Log");
        assert_eq!(
            store.last_filter().and_then(|f| f.pinned_partition_key().map(str::to_string)),
            Some("Test%20Log".to_string())
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn should_track_blocking_inside_multi_thread_runtime() {
        // given
        let (log, store, _clock) = log_with(InsertBehavior::Normal, Some("internal_id")).await;

        // when
        let tracked = log.track_blocking(&entry("1234"));

        // then
        assert!(tracked);
        assert_eq!(store.insert_calls(), 1);
    }

    #[tokio::test]
    async fn should_refuse_track_blocking_on_current_thread_runtime() {
        let (log, store, _clock) = log_with(InsertBehavior::Normal, Some("internal_id")).await;
        assert!(!log.track_blocking(&entry("1234")));
        assert_eq!(store.insert_calls(), 0);
    }
}
