//! Merges the migrations of all applications into one global order.
//!
//! The order is: every framework migration by filename, then every other
//! migration pooled across apps and ordered by filename alone. Comparison is
//! byte-wise and case-sensitive. Sorting is stable, so two apps contributing
//! the same filename keep the order in which they were collected; the app name
//! is never used as a secondary key.

use crate::app::FRAMEWORK_APP_NAME;
use crate::migration::MigrationDescriptor;

/// Produces the global apply order.
///
/// `apps` holds the collected migrations of each non-framework app, in the
/// order the apps were collected.
pub fn sequence(
    framework: Vec<MigrationDescriptor>,
    apps: Vec<Vec<MigrationDescriptor>>,
) -> Vec<MigrationDescriptor> {
    let mut head = framework;
    head.sort_by(|a, b| a.filename.cmp(&b.filename));

    let mut tail: Vec<MigrationDescriptor> = apps.into_iter().flatten().collect();
    tail.sort_by(|a, b| a.filename.cmp(&b.filename));

    head.extend(tail);
    head
}

/// Like [`sequence`], for a flat collection where framework migrations are
/// recognised by their app name.
pub fn sequence_collected(collected: Vec<MigrationDescriptor>) -> Vec<MigrationDescriptor> {
    let (framework, apps): (Vec<_>, Vec<_>) = collected
        .into_iter()
        .partition(|m| m.app_name == FRAMEWORK_APP_NAME);
    sequence(framework, vec![apps])
}
