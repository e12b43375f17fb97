//! Collects the migration scripts an application contributes.
//!
//! Filenames are the only ordering key the platform has, so they are expected
//! to carry a sortable timestamp prefix (e.g. `20250826012513_init.sql`). A
//! misnamed file is silently misordered; nothing here can detect it.

use crate::app::AppDescriptor;
use crate::migration::MigrationDescriptor;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;

/// Default location of migration scripts, relative to an app's root.
pub const DEFAULT_MIGRATIONS_SUBPATH: &str = "db/migrations";

/// Default extension of migration scripts.
pub const DEFAULT_SCRIPT_EXTENSION: &str = "sql";

/// A migration directory exists but could not be read.
#[derive(Debug, thiserror::Error)]
#[error("Failed to collect migrations for app '{app}' from {}: {source}", path.display())]
pub struct CollectionError {
    /// The application whose migrations could not be read.
    pub app: String,
    /// The file or directory that failed.
    pub path: PathBuf,
    /// The underlying I/O error.
    pub source: std::io::Error,
}

/// Provides the migration scripts of an application.
///
/// Implementations return scripts in no particular order; ordering belongs to
/// the [`sequencer`](crate::sequencer).
#[async_trait]
pub trait MigrationSource: Send + Sync {
    /// Collects every migration script of `app`.
    ///
    /// An app without migrations yields an empty vector, not an error.
    async fn collect(
        &self,
        app: &AppDescriptor,
    ) -> Result<Vec<MigrationDescriptor>, CollectionError>;
}

/// Reads migration scripts from `<root_path>/<subpath>/*.<extension>`.
///
/// The default subpath is `db/migrations`. Apps whose scripts are generated by
/// drizzle-kit into `db/drizzle` are not found there and contribute nothing
/// unless the source is built with `with_subpath("db/drizzle")`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectorySource {
    subpath: PathBuf,
    extension: String,
}

impl Default for DirectorySource {
    fn default() -> Self {
        Self {
            subpath: PathBuf::from(DEFAULT_MIGRATIONS_SUBPATH),
            extension: DEFAULT_SCRIPT_EXTENSION.to_string(),
        }
    }
}

impl DirectorySource {
    /// Creates a source reading from the default `db/migrations` subpath.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads scripts from `subpath` instead of the default.
    pub fn with_subpath(mut self, subpath: impl Into<PathBuf>) -> Self {
        self.subpath = subpath.into();
        self
    }

    /// Only collects files ending in `.{extension}`.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// The migration directory of `app`.
    pub fn migrations_dir(&self, app: &AppDescriptor) -> PathBuf {
        app.root_path.join(&self.subpath)
    }

    fn is_script(&self, filename: &str) -> bool {
        filename
            .strip_suffix(self.extension.as_str())
            .is_some_and(|stem| stem.ends_with('.'))
    }
}

#[async_trait]
impl MigrationSource for DirectorySource {
    async fn collect(
        &self,
        app: &AppDescriptor,
    ) -> Result<Vec<MigrationDescriptor>, CollectionError> {
        let dir = self.migrations_dir(app);
        let failed = |path: PathBuf| {
            let app = app.name.clone();
            move |source| CollectionError { app, path, source }
        };

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::info!(
                    "No migrations directory for app '{}' at {}, skipping",
                    app.name,
                    dir.display()
                );
                return Ok(Vec::new());
            }
            Err(e) => return Err(failed(dir)(e)),
        };

        let mut migrations = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(failed(dir.clone()))? {
            let path = entry.path();
            let Some(filename) = entry.file_name().to_str().map(str::to_owned) else {
                log::warn!(
                    "Ignoring migration with non UTF-8 filename {} in app '{}'",
                    path.display(),
                    app.name
                );
                continue;
            };
            if !self.is_script(&filename) {
                continue;
            }
            let file_type = entry.file_type().await.map_err(failed(path.clone()))?;
            if !file_type.is_file() {
                continue;
            }

            let content = tokio::fs::read_to_string(&path)
                .await
                .map_err(failed(path.clone()))?;
            migrations.push(MigrationDescriptor::new(&app.name, filename, content));
        }

        log::debug!(
            "Collected {} migrations for app '{}' from {}",
            migrations.len(),
            app.name,
            dir.display()
        );
        Ok(migrations)
    }
}
