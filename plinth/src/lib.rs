//! # Plinth
//!
//! Forward-only SQL migrations for platforms hosting many applications on
//! one database. The framework's own migrations run first, then every
//! application's scripts in a single global order by filename.
//!
//! Enable the `postgres` feature for the PostgreSQL store, or `in-memory`
//! for the fake store used in tests.

#![deny(missing_docs)]

pub use plinth_core::*;

#[cfg(feature = "in-memory")]
/// In-memory ledger store and migration source.
pub mod mem {
    //! Re-exports of the `plinth_mem` crate.
    pub use plinth_mem::*;
}

#[cfg(feature = "postgres")]
/// PostgreSQL ledger store.
pub mod pg {
    //! Re-exports of the `plinth_pg` crate.
    pub use plinth_pg::*;
}

pub mod prelude {
    //! The prelude module for the `plinth` crate.
    pub use plinth_core::prelude::*;
    pub use plinth_core::registry::{DiscoveryOptions, discover_apps};

    #[cfg(feature = "in-memory")]
    pub use plinth_mem::{InMemoryLedgerStore, InMemorySource};
    #[cfg(feature = "postgres")]
    pub use plinth_pg::{FrameworkSource, PgConfig, PgLedgerStore, framework_app, migrate};
}
