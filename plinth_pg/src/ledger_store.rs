//! PostgreSQL ledger store.
//!
//! The ledger lives in the `__plinth_migrations` table:
//!
//! | column | type | constraint |
//! |---|---|---|
//! | id | text | primary key (`migration_<uuid v7>`) |
//! | filename | text | not null, indexed |
//! | app | text | not null, indexed |
//! | created_at | timestamptz | not null, default now() |
//! | updated_at | timestamptz | not null, default now(), refreshed on update |
//!
//! Its DDL is the framework's first migration, so on a virgin database the
//! first migration of a run creates the ledger and records itself in it.

use async_trait::async_trait;
use plinth_core::migration::{LEDGER_TABLE, new_ledger_id};
use plinth_core::{LedgerRecord, LedgerStore, LedgerTransaction};
use sqlx::pool::PoolConnection;
use sqlx::{Executor, FromRow, PgPool, Postgres};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// DDL creating the ledger table, its indexes and its `updated_at` trigger.
pub const LEDGER_DDL: &str =
    include_str!("../framework/db/migrations/0000_create_migrations_ledger.sql");

/// Advisory lock key used when none is configured (`"plinth"` in ASCII).
pub const DEFAULT_LOCK_KEY: i64 = 0x706c_696e_7468;

/// Postgres representation of a ledger row
#[derive(Debug, FromRow)]
struct PgLedgerRow {
    id: String,
    filename: String,
    app: String,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<PgLedgerRow> for LedgerRecord {
    fn from(row: PgLedgerRow) -> Self {
        LedgerRecord {
            id: row.id,
            filename: row.filename,
            app: row.app,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Smallest pool a locked run can make progress with: one connection holds
/// the advisory lock while another applies migrations.
pub const MIN_LOCKED_POOL_SIZE: u32 = 2;

/// The advisory lock of one run, with the connection whose session holds it.
#[derive(Debug)]
struct HeldRunLock {
    conn: PoolConnection<Postgres>,
    /// Keeps other runs sharing this store waiting until release.
    _gate: OwnedMutexGuard<()>,
}

/// A postgres based ledger store.
///
/// The run lock is a session-level advisory lock, so it is held on a
/// dedicated pooled connection until released. Clones share the lock: a run
/// on one clone waits for a run on another to release it.
#[derive(Clone, Debug)]
pub struct PgLedgerStore {
    pool: PgPool,
    lock_key: i64,
    run_gate: Arc<Mutex<()>>,
    held: Arc<Mutex<Option<HeldRunLock>>>,
}

impl PgLedgerStore {
    /// Creates a new `PgLedgerStore`.
    pub fn new(pool: PgPool) -> Self {
        log::debug!("Creating a new PgLedgerStore");
        Self {
            pool,
            lock_key: DEFAULT_LOCK_KEY,
            run_gate: Arc::new(Mutex::new(())),
            held: Arc::new(Mutex::new(None)),
        }
    }

    /// Uses `key` for the advisory run lock.
    pub fn with_lock_key(mut self, key: i64) -> Self {
        self.lock_key = key;
        self
    }

    /// The advisory lock key guarding orchestration runs.
    pub fn lock_key(&self) -> i64 {
        self.lock_key
    }

    /// Exposes the underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

async fn ledger_exists<'a, E>(executor: E) -> Result<bool, sqlx::Error>
where
    E: sqlx::PgExecutor<'a>,
{
    let (exists,): (bool,) = sqlx::query_as(
        r#"
        SELECT EXISTS (
            SELECT 1
            FROM information_schema.tables
            WHERE table_schema = current_schema()
            AND table_name = $1
        )
        "#,
    )
    .bind(LEDGER_TABLE)
    .fetch_one(executor)
    .await?;

    Ok(exists)
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    type Error = sqlx::Error;
    type Transaction = PgLedgerTransaction;

    async fn begin(&self) -> Result<Self::Transaction, Self::Error> {
        Ok(PgLedgerTransaction::new(self.pool.begin().await?))
    }

    async fn applied(&self) -> Result<Vec<LedgerRecord>, Self::Error> {
        if !ledger_exists(&self.pool).await? {
            return Ok(Vec::new());
        }

        let rows: Vec<PgLedgerRow> = sqlx::query_as(
            r#"
            SELECT id, filename, app, created_at, updated_at
            FROM __plinth_migrations
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(LedgerRecord::from).collect())
    }

    async fn acquire_run_lock(&self) -> Result<(), Self::Error> {
        let max_connections = self.pool.options().get_max_connections();
        if max_connections < MIN_LOCKED_POOL_SIZE {
            return Err(sqlx::Error::Configuration(
                format!(
                    "the migration run lock needs a pool of at least {} connections, got {}",
                    MIN_LOCKED_POOL_SIZE, max_connections
                )
                .into(),
            ));
        }

        let gate = self.run_gate.clone().lock_owned().await;
        let mut conn = self.pool.acquire().await?;
        log::debug!("Waiting for migration run lock {}", self.lock_key);
        sqlx::query("SELECT pg_advisory_lock($1)")
            .bind(self.lock_key)
            .execute(&mut *conn)
            .await?;
        log::debug!("Acquired migration run lock {}", self.lock_key);

        *self.held.lock().await = Some(HeldRunLock { conn, _gate: gate });
        Ok(())
    }

    async fn release_run_lock(&self) -> Result<(), Self::Error> {
        let Some(mut held) = self.held.lock().await.take() else {
            return Ok(());
        };

        let unlocked: Result<(bool,), sqlx::Error> =
            sqlx::query_as("SELECT pg_advisory_unlock($1)")
                .bind(self.lock_key)
                .fetch_one(&mut *held.conn)
                .await;

        match unlocked {
            Ok((true,)) => Ok(()),
            Ok((false,)) => {
                log::warn!(
                    "Migration run lock {} was not held when releasing it",
                    self.lock_key
                );
                Ok(())
            }
            Err(e) => {
                // Ending the session is the only other way to drop a session lock.
                if let Err(close_err) = held.conn.close().await {
                    log::warn!(
                        "Failed to close the connection holding run lock {}: {}",
                        self.lock_key,
                        close_err
                    );
                }
                Err(e)
            }
        }
    }
}

/// Wrapper for a sqlx transaction applying one migration.
///
/// Dropping it without [`commit`](LedgerTransaction::commit) rolls back.
/// Access to the underlying transaction is provided via `Deref` and
/// `DerefMut`, allowing use as a sqlx executor (e.g., `&mut **tx`).
pub struct PgLedgerTransaction(sqlx::Transaction<'static, Postgres>);

impl PgLedgerTransaction {
    /// Creates a new PgLedgerTransaction wrapper.
    pub fn new(tx: sqlx::Transaction<'static, Postgres>) -> Self {
        Self(tx)
    }
}

#[async_trait]
impl LedgerTransaction for PgLedgerTransaction {
    type Error = sqlx::Error;

    async fn ledger_exists(&mut self) -> Result<bool, Self::Error> {
        ledger_exists(&mut *self.0).await
    }

    async fn is_applied(&mut self, app: &str, filename: &str) -> Result<bool, Self::Error> {
        let (applied,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM __plinth_migrations
                WHERE filename = $1 AND app = $2
            )
            "#,
        )
        .bind(filename)
        .bind(app)
        .fetch_one(&mut *self.0)
        .await?;

        Ok(applied)
    }

    async fn execute_script(&mut self, script: &str) -> Result<(), Self::Error> {
        // Simple query protocol: one script may hold many statements.
        let conn: &mut sqlx::PgConnection = &mut self.0;
        conn.execute(sqlx::raw_sql(script)).await?;
        Ok(())
    }

    async fn ensure_ledger(&mut self) -> Result<(), Self::Error> {
        if ledger_exists(&mut *self.0).await? {
            return Ok(());
        }
        log::info!("Creating migrations ledger {}", LEDGER_TABLE);
        let conn: &mut sqlx::PgConnection = &mut self.0;
        conn.execute(sqlx::raw_sql(LEDGER_DDL)).await?;
        Ok(())
    }

    async fn record(&mut self, app: &str, filename: &str) -> Result<(), Self::Error> {
        sqlx::query(
            r#"
            INSERT INTO __plinth_migrations (id, filename, app)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(new_ledger_id())
        .bind(filename)
        .bind(app)
        .execute(&mut *self.0)
        .await?;

        Ok(())
    }

    async fn commit(self) -> Result<(), Self::Error> {
        self.0.commit().await
    }

    async fn rollback(self) -> Result<(), Self::Error> {
        self.0.rollback().await
    }
}

impl std::ops::Deref for PgLedgerTransaction {
    type Target = sqlx::Transaction<'static, Postgres>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::ops::DerefMut for PgLedgerTransaction {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}
