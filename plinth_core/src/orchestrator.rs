//! The startup entry point: collect, sequence, apply.
//!
//! # Usage
//!
//! ```rust,ignore
//! use plinth_core::{AppDescriptor, DirectorySource, Orchestrator};
//!
//! let orchestrator = Orchestrator::new(store, DirectorySource::new());
//! let framework = AppDescriptor::framework("/srv/plinth");
//!
//! // Must complete before any application route is registered.
//! let report = orchestrator.run(&framework, &apps).await?;
//! println!("Applied {} migrations", report.applied.len());
//! ```
//!
//! Migrations are applied strictly one at a time in the global order. The
//! first failure aborts the run: later migrations may depend on the failed
//! one, so none of them are attempted.

use crate::app::{AppDescriptor, RegistryError, validate_registry};
use crate::applier::{self, ApplyOutcome};
use crate::collector::MigrationSource;
use crate::config::OrchestratorConfig;
use crate::error::MigrationError;
use crate::migration::{MigrationDescriptor, MigrationId};
use crate::sequencer;
use crate::store::LedgerStore;

/// Outcome of a successful orchestration run, in apply order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Migrations applied by this run.
    pub applied: Vec<MigrationId>,
    /// Migrations the ledger already recorded.
    pub skipped: Vec<MigrationId>,
}

/// Applies the migrations of the framework and every registered application.
#[derive(Debug, Clone)]
pub struct Orchestrator<S, M> {
    store: S,
    source: M,
    config: OrchestratorConfig,
}

impl<S, M> Orchestrator<S, M>
where
    S: LedgerStore,
    M: MigrationSource,
{
    /// Creates an orchestrator with the default configuration.
    pub fn new(store: S, source: M) -> Self {
        Self {
            store,
            source,
            config: OrchestratorConfig::default(),
        }
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// The ledger store migrations are applied to.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The active configuration.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Collects every app's migrations and returns them in global apply order.
    ///
    /// A collection failure in any app aborts: skipping an app would let later
    /// migrations run against a schema they may depend on.
    pub async fn sequenced(
        &self,
        framework: &AppDescriptor,
        apps: &[AppDescriptor],
    ) -> Result<Vec<MigrationDescriptor>, MigrationError<S::Error>> {
        if !framework.is_framework() {
            return Err(RegistryError::NotFramework(framework.name.clone()).into());
        }
        validate_registry(apps)?;

        let framework_migrations = self.source.collect(framework).await?;
        let mut app_migrations = Vec::with_capacity(apps.len());
        for app in apps {
            app_migrations.push(self.source.collect(app).await?);
        }

        Ok(sequencer::sequence(framework_migrations, app_migrations))
    }

    /// Runs every pending migration, framework first.
    ///
    /// Any error is fatal to startup; the hosting process should refuse to
    /// serve traffic. Migrations applied before the failure stay applied, the
    /// failing one is rolled back and retried on the next run.
    pub async fn run(
        &self,
        framework: &AppDescriptor,
        apps: &[AppDescriptor],
    ) -> Result<RunReport, MigrationError<S::Error>> {
        if self.config.run_lock {
            self.store
                .acquire_run_lock()
                .await
                .map_err(MigrationError::Lock)?;
        }

        let result = self.run_unlocked(framework, apps).await;

        if self.config.run_lock {
            if let Err(e) = self.store.release_run_lock().await {
                log::warn!("Failed to release the migration run lock: {}", e);
            }
        }

        result
    }

    async fn run_unlocked(
        &self,
        framework: &AppDescriptor,
        apps: &[AppDescriptor],
    ) -> Result<RunReport, MigrationError<S::Error>> {
        let migrations = self.sequenced(framework, apps).await?;
        log::info!(
            "Found {} migrations across {} apps",
            migrations.len(),
            apps.len() + 1
        );

        let mut report = RunReport::default();
        for migration in &migrations {
            match self.apply(migration).await {
                Ok(ApplyOutcome::Applied) => {
                    log::info!(
                        "Applied migration {}/{}",
                        migration.app_name,
                        migration.filename
                    );
                    report.applied.push(migration.id());
                }
                Ok(ApplyOutcome::Skipped) => {
                    log::debug!(
                        "Skipping migration {}/{}: already applied",
                        migration.app_name,
                        migration.filename
                    );
                    report.skipped.push(migration.id());
                }
                Err(e) => {
                    log::error!("{}", e);
                    return Err(e);
                }
            }
        }

        log::info!(
            "Migrations complete: {} applied, {} already applied",
            report.applied.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    async fn apply(
        &self,
        migration: &MigrationDescriptor,
    ) -> Result<ApplyOutcome, MigrationError<S::Error>> {
        let Some(after) = self.config.migration_timeout else {
            return applier::apply(&self.store, migration).await;
        };

        // An elapsed timeout drops the transaction uncommitted.
        match tokio::time::timeout(after, applier::apply(&self.store, migration)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(MigrationError::Timeout {
                app: migration.app_name.clone(),
                filename: migration.filename.clone(),
                after,
            }),
        }
    }

    /// Lists the migrations a [`run`](Self::run) would apply, in order.
    ///
    /// Read-only: each check happens in a transaction that is rolled back.
    pub async fn pending(
        &self,
        framework: &AppDescriptor,
        apps: &[AppDescriptor],
    ) -> Result<Vec<MigrationId>, MigrationError<S::Error>> {
        let mut pending = Vec::new();
        for migration in self.sequenced(framework, apps).await? {
            if !applier::is_applied(&self.store, &migration).await? {
                pending.push(migration.id());
            }
        }
        Ok(pending)
    }
}
