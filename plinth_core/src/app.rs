//! Application descriptors.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// The reserved name of the framework's own pseudo-application.
///
/// Never discovered from disk; it is synthesized by [`AppDescriptor::framework`].
pub const FRAMEWORK_APP_NAME: &str = "__plinth_framework";

/// An application mounted into the platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppDescriptor {
    /// Unique, stable identifier of the application. Recorded in the ledger.
    pub name: String,
    /// Filesystem location of the application.
    pub root_path: PathBuf,
}

impl AppDescriptor {
    /// Creates a new application descriptor.
    pub fn new(name: impl Into<String>, root_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root_path: root_path.into(),
        }
    }

    /// Synthesizes the framework pseudo-application rooted at `root_path`.
    pub fn framework(root_path: impl Into<PathBuf>) -> Self {
        Self::new(FRAMEWORK_APP_NAME, root_path)
    }

    /// Whether this descriptor is the framework pseudo-application.
    pub fn is_framework(&self) -> bool {
        self.name == FRAMEWORK_APP_NAME
    }

    /// The root path of the application.
    pub fn root(&self) -> &Path {
        &self.root_path
    }
}

/// Problems with the set of registered applications.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// An application was registered without a name.
    #[error("Application at {} has an empty name", .0.display())]
    EmptyName(PathBuf),
    /// A registered application uses the framework's reserved name.
    #[error("Application at {} uses the reserved name '{}'", .0.display(), FRAMEWORK_APP_NAME)]
    ReservedName(PathBuf),
    /// Two registered applications share a name.
    #[error("Application name '{0}' is registered more than once")]
    DuplicateName(String),
    /// The descriptor passed as the framework does not carry the reserved name.
    #[error("Framework application must be named '{}', got '{}'", FRAMEWORK_APP_NAME, .0)]
    NotFramework(String),
}

/// Checks that registered applications have unique, non-reserved names.
///
/// `apps` must not contain the framework pseudo-application.
pub fn validate_registry(apps: &[AppDescriptor]) -> Result<(), RegistryError> {
    let mut seen = HashSet::with_capacity(apps.len());
    for app in apps {
        if app.name.is_empty() {
            return Err(RegistryError::EmptyName(app.root_path.clone()));
        }
        if app.is_framework() {
            return Err(RegistryError::ReservedName(app.root_path.clone()));
        }
        if !seen.insert(app.name.as_str()) {
            return Err(RegistryError::DuplicateName(app.name.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framework_descriptor_uses_reserved_name() {
        let app = AppDescriptor::framework("/srv/plinth");
        assert_eq!(app.name, FRAMEWORK_APP_NAME);
        assert!(app.is_framework());
        assert!(!AppDescriptor::new("billing", "/srv/billing").is_framework());
    }

    #[test]
    fn registry_accepts_distinct_names() {
        let apps = vec![
            AppDescriptor::new("billing", "/srv/billing"),
            AppDescriptor::new("invoicing", "/srv/invoicing"),
        ];
        assert_eq!(validate_registry(&apps), Ok(()));
    }

    #[test]
    fn registry_rejects_reserved_name() {
        let apps = vec![AppDescriptor::new(FRAMEWORK_APP_NAME, "/srv/impostor")];
        assert_eq!(
            validate_registry(&apps),
            Err(RegistryError::ReservedName(PathBuf::from("/srv/impostor")))
        );
    }

    #[test]
    fn registry_rejects_duplicates() {
        let apps = vec![
            AppDescriptor::new("billing", "/srv/a"),
            AppDescriptor::new("billing", "/srv/b"),
        ];
        assert_eq!(
            validate_registry(&apps),
            Err(RegistryError::DuplicateName("billing".to_string()))
        );
    }

    #[test]
    fn registry_rejects_empty_name() {
        let apps = vec![AppDescriptor::new("", "/srv/nameless")];
        assert!(matches!(
            validate_registry(&apps),
            Err(RegistryError::EmptyName(_))
        ));
    }
}
