//! # Plinth memory store
//!
//! In-memory implementations of plinth's ledger store and migration source,
//! primarily for testing the orchestrator without a database.
//!
//! ```ignore
//! use plinth_core::{AppDescriptor, Orchestrator};
//! use plinth_mem::{InMemoryLedgerStore, InMemorySource};
//!
//! let store = InMemoryLedgerStore::new();
//! let source = InMemorySource::new()
//!     .with_script("billing", "0001_init.sql", "CREATE TABLE invoices (id INT);");
//!
//! let orchestrator = Orchestrator::new(store.clone(), source);
//! orchestrator.run(&AppDescriptor::framework("/"), &apps).await?;
//!
//! assert!(store.has_table("invoices").await);
//! ```
//!
//! See [`InMemoryTransaction`] for the transaction semantics and
//! [`InMemoryStoreError`] for the errors the fake database raises.

#![deny(missing_docs)]

mod ledger_store;
mod script;
mod source;

pub use ledger_store::*;
pub use script::InMemoryStoreError;
pub use source::InMemorySource;
