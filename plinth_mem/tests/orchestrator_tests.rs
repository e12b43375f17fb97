//! Orchestrator behaviour against the in-memory ledger store.

use plinth_core::migration::LEDGER_TABLE;
use plinth_core::{
    AppDescriptor, FRAMEWORK_APP_NAME, LedgerStore, MigrationError, MigrationId, Orchestrator,
    OrchestratorConfig, RegistryError,
};
use plinth_mem::{InMemoryLedgerStore, InMemorySource, InMemoryStoreError};
use std::time::Duration;

const LEDGER_DDL: &str = "CREATE TABLE IF NOT EXISTS __plinth_migrations (id TEXT PRIMARY KEY);";

fn framework() -> AppDescriptor {
    AppDescriptor::framework("/srv/plinth")
}

fn app(name: &str) -> AppDescriptor {
    AppDescriptor::new(name, format!("/srv/{name}"))
}

fn ids(pairs: &[(&str, &str)]) -> Vec<MigrationId> {
    pairs
        .iter()
        .map(|(app, filename)| MigrationId::new(*app, *filename))
        .collect()
}

async fn ledger(store: &InMemoryLedgerStore) -> Vec<MigrationId> {
    store
        .applied()
        .await
        .unwrap()
        .iter()
        .map(|r| r.migration_id())
        .collect()
}

#[tokio::test]
async fn applies_framework_first_then_pooled_apps_by_filename() {
    let _ = env_logger::builder().is_test(true).try_init();
    let store = InMemoryLedgerStore::new();
    let source = InMemorySource::new()
        .with_script(FRAMEWORK_APP_NAME, "0002_b.sql", "CREATE TABLE b (id INT);")
        .with_script(FRAMEWORK_APP_NAME, "0001_a.sql", LEDGER_DDL)
        .with_script("x", "0001_x.sql", "CREATE TABLE x (id INT);")
        .with_script("y", "0000_y.sql", "CREATE TABLE y (id INT);");
    let orchestrator = Orchestrator::new(store.clone(), source);

    let report = orchestrator
        .run(&framework(), &[app("x"), app("y")])
        .await
        .unwrap();

    let expected = ids(&[
        (FRAMEWORK_APP_NAME, "0001_a.sql"),
        (FRAMEWORK_APP_NAME, "0002_b.sql"),
        ("y", "0000_y.sql"),
        ("x", "0001_x.sql"),
    ]);
    assert_eq!(report.applied, expected);
    assert!(report.skipped.is_empty());
    assert_eq!(ledger(&store).await, expected);
}

#[tokio::test]
async fn second_run_applies_nothing() {
    let store = InMemoryLedgerStore::new();
    let source = InMemorySource::new()
        .with_script(FRAMEWORK_APP_NAME, "0000_ledger.sql", LEDGER_DDL)
        .with_script("billing", "0001_init.sql", "CREATE TABLE invoices (id INT);")
        .with_script("billing", "0002_seed.sql", "INSERT INTO invoices VALUES (1);");
    let orchestrator = Orchestrator::new(store.clone(), source);
    let apps = [app("billing")];

    let first = orchestrator.run(&framework(), &apps).await.unwrap();
    assert_eq!(first.applied.len(), 3);
    let records_before = store.applied().await.unwrap();
    let statements_before = store.executed_statements().await;

    let second = orchestrator.run(&framework(), &apps).await.unwrap();

    assert!(second.applied.is_empty());
    assert_eq!(second.skipped, first.applied);
    assert_eq!(store.applied().await.unwrap(), records_before);
    assert_eq!(store.executed_statements().await, statements_before);
}

#[tokio::test]
async fn failed_script_leaves_no_partial_change_and_no_record() {
    let store = InMemoryLedgerStore::new();
    let source = InMemorySource::new()
        .with_script(FRAMEWORK_APP_NAME, "0000_ledger.sql", LEDGER_DDL)
        .with_script(
            "billing",
            "0001_init.sql",
            "CREATE TABLE invoices (id INT); INSERT INTO missing VALUES (1);",
        );
    let orchestrator = Orchestrator::new(store.clone(), source);

    let err = orchestrator
        .run(&framework(), &[app("billing")])
        .await
        .unwrap_err();

    match &err {
        MigrationError::ScriptExecution {
            app,
            filename,
            source,
        } => {
            assert_eq!(app, "billing");
            assert_eq!(filename, "0001_init.sql");
            assert_eq!(
                *source,
                InMemoryStoreError::UndefinedTable("missing".to_string())
            );
        }
        other => panic!("Expected ScriptExecution, got {other:?}"),
    }
    assert!(err.to_string().contains("billing/0001_init.sql"));
    assert!(!store.has_table("invoices").await);
    assert_eq!(
        ledger(&store).await,
        ids(&[(FRAMEWORK_APP_NAME, "0000_ledger.sql")])
    );
}

#[tokio::test]
async fn failed_ledger_write_rolls_back_the_script() {
    let store = InMemoryLedgerStore::new();
    let source = InMemorySource::new().with_script(
        "billing",
        "0001_init.sql",
        "CREATE TABLE invoices (id INT);",
    );
    let orchestrator = Orchestrator::new(store.clone(), source);
    store.fail_ledger_writes(true);

    let err = orchestrator
        .run(&framework(), &[app("billing")])
        .await
        .unwrap_err();

    assert!(matches!(err, MigrationError::LedgerWrite { .. }));
    assert_eq!(
        err.migration(),
        Some(MigrationId::new("billing", "0001_init.sql"))
    );
    assert!(!store.has_table("invoices").await);
    assert!(!store.has_table(LEDGER_TABLE).await);
}

#[tokio::test]
async fn app_without_migrations_contributes_nothing() {
    let store = InMemoryLedgerStore::new();
    let source = InMemorySource::new()
        .with_script("billing", "0001_init.sql", "CREATE TABLE invoices (id INT);");
    let orchestrator = Orchestrator::new(store.clone(), source);

    let report = orchestrator
        .run(&framework(), &[app("empty"), app("billing")])
        .await
        .unwrap();

    assert_eq!(report.applied, ids(&[("billing", "0001_init.sql")]));
}

#[tokio::test]
async fn first_migration_creates_and_records_ledger_on_empty_database() {
    let store = InMemoryLedgerStore::new();
    let source = InMemorySource::new()
        .with_script(FRAMEWORK_APP_NAME, "0000_ledger.sql", LEDGER_DDL)
        .with_script(FRAMEWORK_APP_NAME, "0001_settings.sql", "CREATE TABLE settings (id INT);");
    let orchestrator = Orchestrator::new(store.clone(), source);
    assert!(!store.has_table(LEDGER_TABLE).await);

    let report = orchestrator.run(&framework(), &[]).await.unwrap();

    assert_eq!(report.applied.len(), 2);
    assert!(store.has_table(LEDGER_TABLE).await);
    assert_eq!(
        ledger(&store).await,
        ids(&[
            (FRAMEWORK_APP_NAME, "0000_ledger.sql"),
            (FRAMEWORK_APP_NAME, "0001_settings.sql"),
        ])
    );
}

#[tokio::test]
async fn ledger_is_created_when_no_script_creates_it() {
    let store = InMemoryLedgerStore::new();
    let source = InMemorySource::new()
        .with_script("billing", "0001_init.sql", "CREATE TABLE invoices (id INT);")
        .with_script("billing", "0002_more.sql", "CREATE TABLE lines (id INT);");
    let orchestrator = Orchestrator::new(store.clone(), source);

    let report = orchestrator.run(&framework(), &[app("billing")]).await.unwrap();

    assert_eq!(report.applied.len(), 2);
    assert_eq!(
        store.tables().await,
        vec![
            LEDGER_TABLE.to_string(),
            "invoices".to_string(),
            "lines".to_string()
        ]
    );
}

#[tokio::test]
async fn same_filename_in_two_apps_is_tracked_independently() {
    let store = InMemoryLedgerStore::new();
    let source = InMemorySource::new()
        .with_script("a", "0001_init.sql", "CREATE TABLE a_things (id INT);");
    let orchestrator = Orchestrator::new(store.clone(), source);
    orchestrator.run(&framework(), &[app("a")]).await.unwrap();

    let source = InMemorySource::new()
        .with_script("a", "0001_init.sql", "CREATE TABLE a_things (id INT);")
        .with_script("b", "0001_init.sql", "CREATE TABLE b_things (id INT);");
    let orchestrator = Orchestrator::new(store.clone(), source);
    let report = orchestrator
        .run(&framework(), &[app("a"), app("b")])
        .await
        .unwrap();

    assert_eq!(report.applied, ids(&[("b", "0001_init.sql")]));
    assert_eq!(report.skipped, ids(&[("a", "0001_init.sql")]));
    assert_eq!(
        ledger(&store).await,
        ids(&[("a", "0001_init.sql"), ("b", "0001_init.sql")])
    );
}

#[tokio::test]
async fn rerun_after_fixing_a_failed_script_resumes_in_order() {
    let store = InMemoryLedgerStore::new();
    let mut source = InMemorySource::new()
        .with_script("billing", "0001.sql", "CREATE TABLE one (id INT);")
        .with_script("billing", "0002.sql", "CREATE TABLE two (id INT);")
        .with_script("billing", "0003.sql", "CREAT TABLE three (id INT);")
        .with_script("billing", "0004.sql", "CREATE TABLE four (id INT);")
        .with_script("billing", "0005.sql", "CREATE TABLE five (id INT);");
    let apps = [app("billing")];

    let err = Orchestrator::new(store.clone(), source.clone())
        .run(&framework(), &apps)
        .await
        .unwrap_err();
    assert_eq!(err.migration(), Some(MigrationId::new("billing", "0003.sql")));
    assert_eq!(
        ledger(&store).await,
        ids(&[("billing", "0001.sql"), ("billing", "0002.sql")])
    );
    assert!(!store.has_table("four").await);

    source.add_script("billing", "0003.sql", "CREATE TABLE three (id INT);");
    let report = Orchestrator::new(store.clone(), source)
        .run(&framework(), &apps)
        .await
        .unwrap();

    assert_eq!(
        report.applied,
        ids(&[
            ("billing", "0003.sql"),
            ("billing", "0004.sql"),
            ("billing", "0005.sql"),
        ])
    );
    assert_eq!(
        report.skipped,
        ids(&[("billing", "0001.sql"), ("billing", "0002.sql")])
    );
    assert_eq!(
        store.executed_statements().await,
        vec![
            "CREATE TABLE one (id INT)",
            "CREATE TABLE two (id INT)",
            "CREATE TABLE three (id INT)",
            "CREATE TABLE four (id INT)",
            "CREATE TABLE five (id INT)",
        ]
    );
}

#[tokio::test]
async fn unreadable_app_aborts_before_anything_is_applied() {
    let store = InMemoryLedgerStore::new();
    let source = InMemorySource::new()
        .with_script("billing", "0001_init.sql", "CREATE TABLE invoices (id INT);")
        .with_unreadable("broken");
    let orchestrator = Orchestrator::new(store.clone(), source);

    let err = orchestrator
        .run(&framework(), &[app("billing"), app("broken")])
        .await
        .unwrap_err();

    assert!(matches!(err, MigrationError::Collection(_)));
    assert_eq!(err.app(), Some("broken"));
    assert!(store.tables().await.is_empty());
}

#[tokio::test]
async fn registry_errors_abort_the_run() {
    let store = InMemoryLedgerStore::new();
    let orchestrator = Orchestrator::new(store.clone(), InMemorySource::new());

    let err = orchestrator
        .run(&framework(), &[app("billing"), app("billing")])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MigrationError::Registry(RegistryError::DuplicateName(_))
    ));

    let err = orchestrator
        .run(&app("billing"), &[])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MigrationError::Registry(RegistryError::NotFramework(_))
    ));
}

#[tokio::test]
async fn slow_migration_times_out_and_rolls_back() {
    let store = InMemoryLedgerStore::new();
    let source = InMemorySource::new()
        .with_script("billing", "0001_init.sql", "CREATE TABLE invoices (id INT);");
    let orchestrator = Orchestrator::new(store.clone(), source).with_config(
        OrchestratorConfig::default().with_migration_timeout(Duration::from_millis(20)),
    );
    store.delay_scripts(Duration::from_millis(500));

    let err = orchestrator
        .run(&framework(), &[app("billing")])
        .await
        .unwrap_err();

    assert!(matches!(err, MigrationError::Timeout { .. }));
    assert_eq!(
        err.migration(),
        Some(MigrationId::new("billing", "0001_init.sql"))
    );
    assert!(store.tables().await.is_empty());
}

#[tokio::test]
async fn run_lock_is_released_after_success_and_failure() {
    let store = InMemoryLedgerStore::new();
    let good = InMemorySource::new()
        .with_script("billing", "0001_init.sql", "CREATE TABLE invoices (id INT);");
    Orchestrator::new(store.clone(), good)
        .run(&framework(), &[app("billing")])
        .await
        .unwrap();
    assert!(!store.is_run_locked().await);

    let bad = InMemorySource::new().with_script("billing", "0002_bad.sql", "CREAT oops;");
    Orchestrator::new(store.clone(), bad)
        .run(&framework(), &[app("billing")])
        .await
        .unwrap_err();
    assert!(!store.is_run_locked().await);
}

#[tokio::test]
async fn pending_lists_unapplied_migrations_without_applying() {
    let store = InMemoryLedgerStore::new();
    let source = InMemorySource::new()
        .with_script(FRAMEWORK_APP_NAME, "0000_ledger.sql", LEDGER_DDL)
        .with_script("billing", "0001_init.sql", "CREATE TABLE invoices (id INT);");
    let orchestrator = Orchestrator::new(store.clone(), source);
    let apps = [app("billing")];

    let pending = orchestrator.pending(&framework(), &apps).await.unwrap();
    assert_eq!(
        pending,
        ids(&[
            (FRAMEWORK_APP_NAME, "0000_ledger.sql"),
            ("billing", "0001_init.sql"),
        ])
    );
    assert!(store.tables().await.is_empty());

    orchestrator.run(&framework(), &apps).await.unwrap();
    assert!(orchestrator.pending(&framework(), &apps).await.unwrap().is_empty());
}
