//! Ledger storage definitions
//!
//! A [`LedgerStore`] is the handle to the shared database. Every migration is
//! applied through its own [`LedgerTransaction`]; nothing is committed unless
//! [`LedgerTransaction::commit`] is called, and dropping a transaction without
//! committing must discard its changes.

use crate::migration::LedgerRecord;
use async_trait::async_trait;

/// The shared database the migrations are applied to.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// The error returned by the store and its transactions.
    type Error: std::error::Error + Send + Sync + 'static;

    /// The transaction type used to apply a single migration.
    type Transaction: LedgerTransaction<Error = Self::Error> + Send;

    /// Opens a new transaction.
    async fn begin(&self) -> Result<Self::Transaction, Self::Error>;

    /// Lists every ledger record, oldest first. Empty when the ledger does not exist.
    async fn applied(&self) -> Result<Vec<LedgerRecord>, Self::Error>;

    /// Takes a store-wide lock for the duration of an orchestration run.
    ///
    /// Backends without a locking primitive keep the default no-op.
    async fn acquire_run_lock(&self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Releases the lock taken by [`LedgerStore::acquire_run_lock`].
    async fn release_run_lock(&self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// One atomic unit of work against the ledger store.
#[async_trait]
pub trait LedgerTransaction: Send {
    /// The error returned by the transaction.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Whether the ledger table exists, as seen by this transaction.
    async fn ledger_exists(&mut self) -> Result<bool, Self::Error>;

    /// Whether a ledger record exists for `(app, filename)`.
    ///
    /// Only meaningful once [`LedgerTransaction::ledger_exists`] returned `true`.
    async fn is_applied(&mut self, app: &str, filename: &str) -> Result<bool, Self::Error>;

    /// Executes the raw text of a migration script.
    async fn execute_script(&mut self, script: &str) -> Result<(), Self::Error>;

    /// Creates the ledger table if it does not exist yet.
    async fn ensure_ledger(&mut self) -> Result<(), Self::Error>;

    /// Inserts the ledger record for `(app, filename)`.
    async fn record(&mut self, app: &str, filename: &str) -> Result<(), Self::Error>;

    /// Commits the transaction.
    async fn commit(self) -> Result<(), Self::Error>;

    /// Rolls back the transaction, discarding all changes.
    async fn rollback(self) -> Result<(), Self::Error>;
}
