//! Applies a single migration inside its own transaction.
//!
//! A migration is either unknown to the ledger or applied; the only
//! transition is from unknown to applied, and it happens atomically:
//!
//! 1. check whether the ledger table exists (re-checked for every migration,
//!    since an earlier migration of the same run may have created it),
//! 2. if it does, check for a record of `(app, filename)` and stop if found,
//! 3. execute the script,
//! 4. create the ledger table if the script did not,
//! 5. insert the ledger record,
//!
//! all in one transaction that is committed at the end or rolled back on any
//! failure.
//!
//! The ledger is bootstrapped after the script, not before it: the
//! framework's first migration creates the ledger itself and must run
//! against a database without one. Both steps share the transaction, so the
//! order is invisible once it commits.

use crate::error::MigrationError;
use crate::migration::MigrationDescriptor;
use crate::store::{LedgerStore, LedgerTransaction};

/// What happened to a migration handed to [`apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The script ran and its ledger record was committed.
    Applied,
    /// A ledger record already existed; nothing ran.
    Skipped,
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Bootstrap,
    Script,
    Record,
    Transaction,
}

fn failure<'m, E>(
    phase: Phase,
    migration: &'m MigrationDescriptor,
) -> impl FnOnce(E) -> MigrationError<E> + 'm
where
    E: std::error::Error + 'static,
{
    move |source| {
        let app = migration.app_name.clone();
        let filename = migration.filename.clone();
        match phase {
            Phase::Bootstrap => MigrationError::Bootstrap {
                app,
                filename,
                source,
            },
            Phase::Script => MigrationError::ScriptExecution {
                app,
                filename,
                source,
            },
            Phase::Record => MigrationError::LedgerWrite {
                app,
                filename,
                source,
            },
            Phase::Transaction => MigrationError::Transaction {
                app,
                filename,
                source,
            },
        }
    }
}

/// Applies `migration` unless the ledger already records it.
pub async fn apply<S>(
    store: &S,
    migration: &MigrationDescriptor,
) -> Result<ApplyOutcome, MigrationError<S::Error>>
where
    S: LedgerStore,
{
    let mut tx = store
        .begin()
        .await
        .map_err(failure(Phase::Transaction, migration))?;

    match apply_in(&mut tx, migration).await {
        Ok(ApplyOutcome::Applied) => {
            tx.commit()
                .await
                .map_err(failure(Phase::Transaction, migration))?;
            Ok(ApplyOutcome::Applied)
        }
        Ok(ApplyOutcome::Skipped) => {
            tx.rollback()
                .await
                .map_err(failure(Phase::Transaction, migration))?;
            Ok(ApplyOutcome::Skipped)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                log::warn!(
                    "Rollback of migration {}/{} failed: {}",
                    migration.app_name,
                    migration.filename,
                    rollback_err
                );
            }
            Err(e)
        }
    }
}

/// Whether the ledger already records `migration`. Changes nothing.
pub async fn is_applied<S>(
    store: &S,
    migration: &MigrationDescriptor,
) -> Result<bool, MigrationError<S::Error>>
where
    S: LedgerStore,
{
    let mut tx = store
        .begin()
        .await
        .map_err(failure(Phase::Transaction, migration))?;

    let applied = check_ledger(&mut tx, migration).await;
    tx.rollback()
        .await
        .map_err(failure(Phase::Transaction, migration))?;
    applied
}

async fn check_ledger<T>(
    tx: &mut T,
    migration: &MigrationDescriptor,
) -> Result<bool, MigrationError<T::Error>>
where
    T: LedgerTransaction,
{
    let ledger_exists = tx
        .ledger_exists()
        .await
        .map_err(failure(Phase::Bootstrap, migration))?;
    if !ledger_exists {
        return Ok(false);
    }
    tx.is_applied(&migration.app_name, &migration.filename)
        .await
        .map_err(failure(Phase::Bootstrap, migration))
}

async fn apply_in<T>(
    tx: &mut T,
    migration: &MigrationDescriptor,
) -> Result<ApplyOutcome, MigrationError<T::Error>>
where
    T: LedgerTransaction,
{
    if check_ledger(tx, migration).await? {
        return Ok(ApplyOutcome::Skipped);
    }

    tx.execute_script(&migration.content)
        .await
        .map_err(failure(Phase::Script, migration))?;

    tx.ensure_ledger()
        .await
        .map_err(failure(Phase::Bootstrap, migration))?;

    tx.record(&migration.app_name, &migration.filename)
        .await
        .map_err(failure(Phase::Record, migration))?;

    Ok(ApplyOutcome::Applied)
}
