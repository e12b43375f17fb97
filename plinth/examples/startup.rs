//! # Startup Example
//!
//! Shows where migrations sit in a platform's boot sequence: discover the
//! applications in a workspace, apply every pending migration, and only then
//! mount the applications' routes.
//!
//! ```text
//! workspace/
//!   billing/db/migrations/0002_invoices.sql
//!   accounts/db/migrations/0001_users.sql
//!   accounts/db/migrations/0003_sessions.sql
//! ```
//!
//! `0001_users.sql` runs before `0002_invoices.sql` even though `billing`
//! sorts first: ordering is global, by filename.
//!
//! The ledger here is in memory. Against PostgreSQL, swap in
//! `plinth_pg::PgLedgerStore` or call `plinth_pg::migrate`.

use plinth::prelude::*;
use plinth_mem::InMemoryLedgerStore;
use std::path::Path;

fn write_script(root: &Path, app: &str, filename: &str, sql: &str) -> std::io::Result<()> {
    let dir = root.join(app).join("db/migrations");
    std::fs::create_dir_all(&dir)?;
    std::fs::write(dir.join(filename), sql)
}

fn mount(apps: &[AppDescriptor]) {
    for app in apps {
        log::info!("Mounted routes for {}", app.name);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let workspace = tempfile::tempdir()?;
    let framework = workspace.path().join("framework");
    write_script(
        workspace.path(),
        "framework",
        "0000_create_migrations_ledger.sql",
        "CREATE TABLE IF NOT EXISTS __plinth_migrations (id TEXT);",
    )?;
    write_script(
        workspace.path(),
        "billing",
        "0002_invoices.sql",
        "CREATE TABLE invoices (id INT);",
    )?;
    write_script(
        workspace.path(),
        "accounts",
        "0001_users.sql",
        "CREATE TABLE users (id INT);",
    )?;
    write_script(
        workspace.path(),
        "accounts",
        "0003_sessions.sql",
        "CREATE TABLE sessions (id INT); ALTER TABLE users ADD COLUMN last_seen INT;",
    )?;

    let options = DiscoveryOptions::default().with_framework_dir("framework");
    let apps = discover_apps(workspace.path(), &options).await?;

    let store = InMemoryLedgerStore::new();
    let orchestrator = Orchestrator::new(store.clone(), DirectorySource::new());
    let framework = AppDescriptor::framework(framework);

    let report = orchestrator.run(&framework, &apps).await?;
    for id in &report.applied {
        println!("applied {}", id);
    }

    // A second boot finds nothing to do.
    let report = orchestrator.run(&framework, &apps).await?;
    println!("second boot applied {} migrations", report.applied.len());

    mount(&apps);
    Ok(())
}
