//! Errors that abort an orchestration run.

use crate::app::RegistryError;
use crate::collector::CollectionError;
use crate::migration::MigrationId;
use std::time::Duration;

/// Errors that abort an orchestration run.
///
/// Every per-migration variant names the application and the filename so the
/// offending script can be found, fixed, and the process restarted. A failed
/// migration's transaction is rolled back, leaving it unapplied.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError<E>
where
    E: std::error::Error + 'static,
{
    /// The set of registered applications is invalid.
    #[error("Invalid application registry: {0}")]
    Registry(#[from] RegistryError),

    /// A migration directory exists but could not be read.
    #[error(transparent)]
    Collection(#[from] CollectionError),

    /// The ledger table could not be checked or created.
    #[error("Migration {app}/{filename}: failed to verify or create the migrations ledger: {source}")]
    Bootstrap {
        /// The application owning the migration.
        app: String,
        /// The migration being applied.
        filename: String,
        /// The store error.
        source: E,
    },

    /// The database rejected the migration script.
    #[error("Migration {app}/{filename} failed: {source}")]
    ScriptExecution {
        /// The application owning the migration.
        app: String,
        /// The migration that failed.
        filename: String,
        /// The store error.
        source: E,
    },

    /// The script ran but its ledger record could not be written.
    #[error("Migration {app}/{filename}: failed to record in the migrations ledger: {source}")]
    LedgerWrite {
        /// The application owning the migration.
        app: String,
        /// The migration being recorded.
        filename: String,
        /// The store error.
        source: E,
    },

    /// The migration's transaction could not be opened or committed.
    #[error("Migration {app}/{filename}: transaction failed: {source}")]
    Transaction {
        /// The application owning the migration.
        app: String,
        /// The migration being applied.
        filename: String,
        /// The store error.
        source: E,
    },

    /// The migration did not finish within the configured timeout.
    #[error("Migration {app}/{filename} timed out after {after:?}")]
    Timeout {
        /// The application owning the migration.
        app: String,
        /// The migration that timed out.
        filename: String,
        /// The configured timeout.
        after: Duration,
    },

    /// The run lock could not be acquired.
    #[error("Failed to acquire the migration run lock: {0}")]
    Lock(#[source] E),
}

impl<E> MigrationError<E>
where
    E: std::error::Error + 'static,
{
    /// The migration this error is attributed to, if any.
    pub fn migration(&self) -> Option<MigrationId> {
        match self {
            Self::Bootstrap { app, filename, .. }
            | Self::ScriptExecution { app, filename, .. }
            | Self::LedgerWrite { app, filename, .. }
            | Self::Transaction { app, filename, .. }
            | Self::Timeout { app, filename, .. } => Some(MigrationId::new(app, filename)),
            Self::Collection(_) | Self::Registry(_) | Self::Lock(_) => None,
        }
    }

    /// The application this error is attributed to, if any.
    pub fn app(&self) -> Option<&str> {
        match self {
            Self::Bootstrap { app, .. }
            | Self::ScriptExecution { app, .. }
            | Self::LedgerWrite { app, .. }
            | Self::Transaction { app, .. }
            | Self::Timeout { app, .. } => Some(app),
            Self::Collection(err) => Some(&err.app),
            Self::Registry(_) | Self::Lock(_) => None,
        }
    }
}
