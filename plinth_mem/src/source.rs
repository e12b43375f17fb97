use async_trait::async_trait;
use plinth_core::{AppDescriptor, CollectionError, MigrationDescriptor, MigrationSource};
use std::collections::{HashMap, HashSet};

/// A [`MigrationSource`] backed by in-memory fixtures instead of directories.
///
/// Apps without fixtures contribute no migrations, like an app without a
/// migrations directory.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    scripts: HashMap<String, Vec<(String, String)>>,
    unreadable: HashSet<String>,
}

impl InMemorySource {
    /// Creates a source with no scripts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a script to `app`. Scripts are emitted in insertion order.
    pub fn with_script(
        mut self,
        app: impl Into<String>,
        filename: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        self.add_script(app, filename, content);
        self
    }

    /// Adds a script to `app`, replacing any script with the same filename.
    pub fn add_script(
        &mut self,
        app: impl Into<String>,
        filename: impl Into<String>,
        content: impl Into<String>,
    ) {
        let filename = filename.into();
        let content = content.into();
        let scripts = self.scripts.entry(app.into()).or_default();
        match scripts.iter_mut().find(|(name, _)| *name == filename) {
            Some(existing) => existing.1 = content,
            None => scripts.push((filename, content)),
        }
    }

    /// Makes collecting `app` fail as if its directory were unreadable.
    pub fn with_unreadable(mut self, app: impl Into<String>) -> Self {
        self.unreadable.insert(app.into());
        self
    }
}

#[async_trait]
impl MigrationSource for InMemorySource {
    async fn collect(
        &self,
        app: &AppDescriptor,
    ) -> Result<Vec<MigrationDescriptor>, CollectionError> {
        if self.unreadable.contains(&app.name) {
            return Err(CollectionError {
                app: app.name.clone(),
                path: app.root_path.clone(),
                source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            });
        }

        Ok(self
            .scripts
            .get(&app.name)
            .map(|scripts| {
                scripts
                    .iter()
                    .map(|(filename, content)| {
                        MigrationDescriptor::new(&app.name, filename, content)
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}
