//! The framework's own migrations, compiled into the binary so a deployed
//! process needs nothing on disk but its applications' scripts.

use crate::ledger_store::LEDGER_DDL;
use async_trait::async_trait;
use plinth_core::{
    AppDescriptor, CollectionError, DirectorySource, MigrationDescriptor, MigrationSource,
};

/// Migrations of the framework pseudo-application, as `(filename, script)`.
///
/// Every script under `framework/db/migrations` must be listed here.
pub const FRAMEWORK_MIGRATIONS: &[(&str, &str)] =
    &[("0000_create_migrations_ledger.sql", LEDGER_DDL)];

/// The framework pseudo-application.
///
/// Its root path is only a label: [`FrameworkSource`] serves its migrations
/// from [`FRAMEWORK_MIGRATIONS`].
pub fn framework_app() -> AppDescriptor {
    AppDescriptor::framework(env!("CARGO_PKG_NAME"))
}

/// A [`MigrationSource`] serving the embedded framework migrations and
/// delegating every other app to `M`.
#[derive(Debug, Clone, Default)]
pub struct FrameworkSource<M = DirectorySource> {
    apps: M,
}

impl FrameworkSource {
    /// Reads application migrations from each app's `db/migrations` directory.
    pub fn from_directories() -> Self {
        Self::new(DirectorySource::new())
    }
}

impl<M> FrameworkSource<M> {
    /// Creates a source reading application migrations through `apps`.
    pub fn new(apps: M) -> Self {
        Self { apps }
    }
}

#[async_trait]
impl<M> MigrationSource for FrameworkSource<M>
where
    M: MigrationSource,
{
    async fn collect(
        &self,
        app: &AppDescriptor,
    ) -> Result<Vec<MigrationDescriptor>, CollectionError> {
        if !app.is_framework() {
            return self.apps.collect(app).await;
        }
        Ok(FRAMEWORK_MIGRATIONS
            .iter()
            .map(|(filename, script)| MigrationDescriptor::new(&app.name, *filename, *script))
            .collect())
    }
}
