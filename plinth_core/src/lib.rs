//! # Plinth core
//!
//! Discovers, orders and applies the schema migrations contributed by every
//! application mounted into one plinth platform, against one shared database.
//!
//! The pipeline is:
//!
//! 1. [`collector`]: each application's migration scripts are read through a
//!    [`MigrationSource`].
//! 2. [`sequencer`]: the collected scripts are merged into one global order,
//!    framework migrations first, then every other app pooled by filename.
//! 3. [`applier`]: each migration runs in its own transaction against a
//!    [`LedgerStore`], which records what was applied.
//!
//! [`Orchestrator`] composes the three and is meant to run once, before any
//! application route is registered.

#![deny(missing_docs)]

pub mod app;
pub mod applier;
pub mod collector;
pub mod config;
mod error;
pub mod migration;
pub mod orchestrator;
pub mod registry;
pub mod sequencer;
pub mod store;

pub use app::{AppDescriptor, FRAMEWORK_APP_NAME, RegistryError, validate_registry};
pub use collector::{CollectionError, DirectorySource, MigrationSource};
pub use config::OrchestratorConfig;
pub use error::MigrationError;
pub use migration::{LedgerRecord, MigrationDescriptor, MigrationId};
pub use orchestrator::{Orchestrator, RunReport};
pub use store::{LedgerStore, LedgerTransaction};

pub mod prelude {
    //! The prelude module for the `plinth_core` crate.
    pub use super::{
        AppDescriptor, CollectionError, DirectorySource, LedgerRecord, LedgerStore,
        LedgerTransaction, MigrationDescriptor, MigrationError, MigrationId, MigrationSource,
        Orchestrator, OrchestratorConfig, RunReport,
    };
}
