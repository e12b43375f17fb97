//! Migration descriptors and ledger records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the table recording applied migrations.
pub const LEDGER_TABLE: &str = "__plinth_migrations";

/// Prefix of every ledger record id.
pub const LEDGER_ID_PREFIX: &str = "migration_";

/// Generates a new, time-sortable ledger record id.
pub fn new_ledger_id() -> String {
    format!("{LEDGER_ID_PREFIX}{}", uuid::Uuid::now_v7().simple())
}

/// A migration script read from an application's migration directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationDescriptor {
    /// Name of the owning application.
    pub app_name: String,
    /// Filename of the script, the chronological key.
    pub filename: String,
    /// Raw script text.
    pub content: String,
}

impl MigrationDescriptor {
    /// Creates a new migration descriptor.
    pub fn new(
        app_name: impl Into<String>,
        filename: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            filename: filename.into(),
            content: content.into(),
        }
    }

    /// The `(app, filename)` identity of this migration.
    pub fn id(&self) -> MigrationId {
        MigrationId::new(&self.app_name, &self.filename)
    }
}

/// Identity of a migration. Filenames may repeat across apps.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MigrationId {
    /// The owning application.
    pub app: String,
    /// The script filename.
    pub filename: String,
}

impl MigrationId {
    /// Creates a new migration id.
    pub fn new(app: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            filename: filename.into(),
        }
    }
}

impl fmt::Display for MigrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.app, self.filename)
    }
}

/// A row of the ledger table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    /// Opaque, sortable unique id.
    pub id: String,
    /// The applied script's filename.
    pub filename: String,
    /// The application the script belongs to.
    pub app: String,
    /// When the migration was applied.
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// Last time the record changed.
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl LedgerRecord {
    /// The identity of the migration this record covers.
    pub fn migration_id(&self) -> MigrationId {
        MigrationId::new(&self.app, &self.filename)
    }
}
