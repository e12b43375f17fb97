//! In-memory ledger store with transaction support.
//!
//! Simulates database transaction semantics: a transaction works on a
//! snapshot of the database taken at `begin`, holds an exclusive lock for its
//! whole lifetime, and swaps its snapshot in on `commit`. Dropping or rolling
//! back a transaction discards the snapshot.
//!
//! Transactions are serialized: a second `begin` waits until the first
//! transaction commits, rolls back or is dropped.

use crate::script::{self, InMemoryStoreError};
use async_trait::async_trait;
use plinth_core::migration::{LEDGER_TABLE, new_ledger_id};
use plinth_core::{LedgerRecord, LedgerStore, LedgerTransaction};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// The in-memory database contents.
#[derive(Debug, Clone, Default)]
struct DatabaseState {
    tables: BTreeSet<String>,
    ledger: Vec<LedgerRecord>,
    executed: Vec<String>,
}

impl DatabaseState {
    fn ledger_exists(&self) -> bool {
        self.tables.contains(LEDGER_TABLE)
    }
}

#[derive(Debug, Default)]
struct Faults {
    fail_ledger_writes: AtomicBool,
    script_delay_ms: AtomicU64,
}

/// An in-memory [`LedgerStore`].
///
/// Clones share the same database.
#[derive(Clone, Debug, Default)]
pub struct InMemoryLedgerStore {
    state: Arc<Mutex<DatabaseState>>,
    tx_lock: Arc<Mutex<()>>,
    run_lock: Arc<Mutex<()>>,
    run_guard: Arc<Mutex<Option<OwnedMutexGuard<()>>>>,
    faults: Arc<Faults>,
}

impl InMemoryLedgerStore {
    /// Creates a new, empty database with no ledger table.
    pub fn new() -> Self {
        log::debug!("Creating a new InMemoryLedgerStore");
        Self::default()
    }

    /// Makes every subsequent ledger insert fail.
    pub fn fail_ledger_writes(&self, fail: bool) {
        self.faults.fail_ledger_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent script execution take at least `delay`.
    pub fn delay_scripts(&self, delay: Duration) {
        self.faults
            .script_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Whether a committed table named `name` exists.
    pub async fn has_table(&self, name: &str) -> bool {
        self.state.lock().await.tables.contains(name)
    }

    /// All committed tables, sorted by name.
    pub async fn tables(&self) -> Vec<String> {
        self.state.lock().await.tables.iter().cloned().collect()
    }

    /// Every committed statement, in execution order.
    pub async fn executed_statements(&self) -> Vec<String> {
        self.state.lock().await.executed.clone()
    }

    /// Whether the run lock is currently held.
    pub async fn is_run_locked(&self) -> bool {
        self.run_guard.lock().await.is_some()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    type Error = InMemoryStoreError;
    type Transaction = InMemoryTransaction;

    async fn begin(&self) -> Result<Self::Transaction, Self::Error> {
        let lock = self.tx_lock.clone().lock_owned().await;
        let snapshot = self.state.lock().await.clone();
        Ok(InMemoryTransaction {
            working: snapshot,
            state: self.state.clone(),
            faults: self.faults.clone(),
            _lock: lock,
        })
    }

    async fn applied(&self) -> Result<Vec<LedgerRecord>, Self::Error> {
        let state = self.state.lock().await;
        if !state.ledger_exists() {
            return Ok(Vec::new());
        }
        Ok(state.ledger.clone())
    }

    async fn acquire_run_lock(&self) -> Result<(), Self::Error> {
        let guard = self.run_lock.clone().lock_owned().await;
        *self.run_guard.lock().await = Some(guard);
        Ok(())
    }

    async fn release_run_lock(&self) -> Result<(), Self::Error> {
        self.run_guard.lock().await.take();
        Ok(())
    }
}

/// A transaction against an [`InMemoryLedgerStore`].
///
/// Buffers all changes in a private snapshot until commit. Reads see the
/// transaction's own writes.
pub struct InMemoryTransaction {
    /// The snapshot this transaction reads and writes
    working: DatabaseState,
    /// The shared database, replaced on commit
    state: Arc<Mutex<DatabaseState>>,
    faults: Arc<Faults>,
    /// Serializes transactions until this one ends
    _lock: OwnedMutexGuard<()>,
}

#[async_trait]
impl LedgerTransaction for InMemoryTransaction {
    type Error = InMemoryStoreError;

    async fn ledger_exists(&mut self) -> Result<bool, Self::Error> {
        Ok(self.working.ledger_exists())
    }

    async fn is_applied(&mut self, app: &str, filename: &str) -> Result<bool, Self::Error> {
        if !self.working.ledger_exists() {
            return Err(InMemoryStoreError::UndefinedTable(LEDGER_TABLE.to_string()));
        }
        Ok(self
            .working
            .ledger
            .iter()
            .any(|r| r.app == app && r.filename == filename))
    }

    async fn execute_script(&mut self, script: &str) -> Result<(), Self::Error> {
        let delay = self.faults.script_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        for statement in script::statements(script) {
            script::execute(&mut self.working.tables, &statement)?;
            if !self.working.ledger_exists() {
                self.working.ledger.clear();
            }
            self.working.executed.push(statement);
        }
        Ok(())
    }

    async fn ensure_ledger(&mut self) -> Result<(), Self::Error> {
        self.working.tables.insert(LEDGER_TABLE.to_string());
        Ok(())
    }

    async fn record(&mut self, app: &str, filename: &str) -> Result<(), Self::Error> {
        if self.faults.fail_ledger_writes.load(Ordering::SeqCst) {
            return Err(InMemoryStoreError::LedgerWriteRejected);
        }
        if !self.working.ledger_exists() {
            return Err(InMemoryStoreError::UndefinedTable(LEDGER_TABLE.to_string()));
        }
        let now = chrono::Utc::now();
        self.working.ledger.push(LedgerRecord {
            id: new_ledger_id(),
            filename: filename.to_string(),
            app: app.to_string(),
            created_at: now,
            updated_at: now,
        });
        Ok(())
    }

    async fn commit(self) -> Result<(), Self::Error> {
        *self.state.lock().await = self.working;
        Ok(())
    }

    async fn rollback(self) -> Result<(), Self::Error> {
        // The snapshot is dropped unapplied.
        Ok(())
    }
}
