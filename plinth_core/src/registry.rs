//! Discovers applications laid out side by side in a workspace directory.
//!
//! Every immediate subdirectory of the workspace root is an application named
//! after the directory. The orchestrator never calls this itself; the
//! platform discovers apps and injects the list.

use crate::app::AppDescriptor;
use std::path::{Path, PathBuf};

/// Which subdirectories of the workspace root are not applications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryOptions {
    /// Directory names that are never applications.
    pub ignore: Vec<String>,
    /// The directory hosting the framework itself, if it lives in the root.
    pub framework_dir: Option<String>,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            ignore: vec!["node_modules".to_string(), "target".to_string()],
            framework_dir: None,
        }
    }
}

impl DiscoveryOptions {
    /// Excludes the framework's own directory from discovery.
    pub fn with_framework_dir(mut self, name: impl Into<String>) -> Self {
        self.framework_dir = Some(name.into());
        self
    }

    fn skips(&self, name: &str) -> bool {
        name.starts_with('.')
            || self.ignore.iter().any(|ignored| ignored == name)
            || self.framework_dir.as_deref() == Some(name)
    }
}

/// Lists the applications under `root`, sorted by name.
pub async fn discover_apps(
    root: impl AsRef<Path>,
    options: &DiscoveryOptions,
) -> std::io::Result<Vec<AppDescriptor>> {
    let root = root.as_ref();
    let mut entries = tokio::fs::read_dir(root).await?;
    let mut apps = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        if options.skips(&name) {
            continue;
        }
        // Follows symlinks, so linked app checkouts count.
        if !tokio::fs::metadata(entry.path()).await?.is_dir() {
            continue;
        }
        let path: PathBuf = entry.path();
        log::debug!("Discovered app '{}' at {}", name, path.display());
        apps.push(AppDescriptor::new(name, path));
    }

    apps.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(apps)
}
