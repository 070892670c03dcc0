//! Store stubs for exercising the client and façade.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use common::storage::in_memory::InMemoryTableStore;
use common::{Filter, StorageError, StorageResult, TableRow, TableStore};

/// How the stub answers inserts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InsertBehavior {
    /// Delegate to the in-memory table.
    Normal,
    /// Signal a conflict for the next `n` inserts, then delegate.
    ConflictTimes(usize),
    AlwaysConflict,
    /// Fail every insert with a non-conflict error.
    Fail,
}

/// An in-memory table with injectable insert failures and call counters.
pub(crate) struct StubStore {
    inner: InMemoryTableStore,
    behavior: Mutex<InsertBehavior>,
    fail_reads: AtomicBool,
    insert_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    attempted_row_keys: Mutex<Vec<String>>,
    last_filter: Mutex<Option<Filter>>,
}

impl StubStore {
    pub(crate) async fn new(behavior: InsertBehavior) -> Self {
        let inner = InMemoryTableStore::new("stub");
        inner
            .create_if_not_exists()
            .await
            .expect("in-memory table creation cannot fail");
        Self {
            inner,
            behavior: Mutex::new(behavior),
            fail_reads: AtomicBool::new(false),
            insert_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
            attempted_row_keys: Mutex::new(Vec::new()),
            last_filter: Mutex::new(None),
        }
    }

    /// Makes every retrieve and query fail.
    pub(crate) fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    pub(crate) fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// Row keys of every insert attempt, in order.
    pub(crate) fn attempted_row_keys(&self) -> Vec<String> {
        self.attempted_row_keys.lock().unwrap().clone()
    }

    pub(crate) fn last_filter(&self) -> Option<Filter> {
        self.last_filter.lock().unwrap().clone()
    }

    fn check_reads(&self) -> StorageResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Storage("injected read failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl TableStore for StubStore {
    fn table_name(&self) -> &str {
        self.inner.table_name()
    }

    async fn create_if_not_exists(&self) -> StorageResult<()> {
        self.inner.create_if_not_exists().await
    }

    async fn insert(&self, row: &TableRow) -> StorageResult<()> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        self.attempted_row_keys
            .lock()
            .unwrap()
            .push(row.row_key.clone());

        let outcome = {
            let mut behavior = self.behavior.lock().unwrap();
            match *behavior {
                InsertBehavior::Normal => None,
                InsertBehavior::ConflictTimes(0) => {
                    *behavior = InsertBehavior::Normal;
                    None
                }
                InsertBehavior::ConflictTimes(n) => {
                    *behavior = InsertBehavior::ConflictTimes(n - 1);
                    Some(StorageError::Conflict("injected conflict".into()))
                }
                InsertBehavior::AlwaysConflict => {
                    Some(StorageError::Conflict("injected conflict".into()))
                }
                InsertBehavior::Fail => Some(StorageError::Storage("injected failure".into())),
            }
        };
        match outcome {
            Some(err) => Err(err),
            None => self.inner.insert(row).await,
        }
    }

    async fn retrieve(
        &self,
        partition_key: &str,
        row_key: &str,
    ) -> StorageResult<Option<TableRow>> {
        self.check_reads()?;
        self.inner.retrieve(partition_key, row_key).await
    }

    async fn query(&self, filter: &Filter) -> StorageResult<Vec<TableRow>> {
        *self.last_filter.lock().unwrap() = Some(filter.clone());
        self.check_reads()?;
        self.inner.query(filter).await
    }

    async fn delete(&self, partition_key: &str, row_key: &str) -> StorageResult<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(partition_key, row_key).await
    }
}
