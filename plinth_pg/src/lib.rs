//! # Plinth postgres store
//!
//! Applies plinth migrations to PostgreSQL.
//!
//! ```rust,ignore
//! use plinth_pg::{PgConfig, migrate};
//!
//! let pool = PgConfig::from_env()?.connect().await?;
//!
//! // Blocks until every migration is applied; attach routes afterwards.
//! let report = migrate(pool, &apps).await?;
//! ```

#![deny(missing_docs)]

/// Connection configuration read from the environment
pub mod config;

/// The ledger store implementation for postgres
pub mod ledger_store;

/// The framework's embedded migrations
pub mod framework;

pub use config::{PgConfig, PgConfigError};
pub use framework::{FRAMEWORK_MIGRATIONS, FrameworkSource, framework_app};
pub use ledger_store::{
    DEFAULT_LOCK_KEY, LEDGER_DDL, MIN_LOCKED_POOL_SIZE, PgLedgerStore, PgLedgerTransaction,
};

use plinth_core::{AppDescriptor, MigrationError, Orchestrator, RunReport};
use sqlx::PgPool;

/// Runs the framework's and every app's pending migrations with the default
/// configuration, reading app scripts from each app's `db/migrations` directory.
pub async fn migrate(
    pool: PgPool,
    apps: &[AppDescriptor],
) -> Result<RunReport, MigrationError<sqlx::Error>> {
    Orchestrator::new(PgLedgerStore::new(pool), FrameworkSource::from_directories())
        .run(&framework_app(), apps)
        .await
}
