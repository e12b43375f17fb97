//! Configuration of an orchestration run.

use std::time::Duration;

/// Controls how the [`Orchestrator`](crate::Orchestrator) applies migrations.
#[derive(Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Maximum time a single migration may take, including its ledger
    /// bookkeeping. A migration exceeding it fails the run and is rolled back.
    ///
    /// Default: `None` (no timeout)
    pub migration_timeout: Option<Duration>,

    /// Whether to hold the store's run lock for the whole run.
    ///
    /// Two replicas starting against the same database otherwise race between
    /// the ledger check and the ledger insert. Stores without a lock primitive
    /// ignore it.
    ///
    /// Default: `true`
    pub run_lock: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            migration_timeout: None,
            run_lock: true,
        }
    }
}

impl OrchestratorConfig {
    /// Sets the per-migration timeout.
    pub fn with_migration_timeout(mut self, timeout: Duration) -> Self {
        self.migration_timeout = Some(timeout);
        self
    }

    /// Enables or disables the run lock.
    pub fn with_run_lock(mut self, enabled: bool) -> Self {
        self.run_lock = enabled;
        self
    }
}

impl std::fmt::Debug for OrchestratorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrchestratorConfig")
            .field(
                "migration_timeout",
                &self
                    .migration_timeout
                    .map_or_else(|| "none".to_string(), |t| format!("{t:?}")),
            )
            .field("run_lock", &self.run_lock)
            .finish()
    }
}
