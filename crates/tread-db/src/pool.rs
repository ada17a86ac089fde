//! # SQLite Pool
//!
//! Opens the connection pool, pins down the session pragmas, and hands out
//! repository handles.
//!
//! ## Startup Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  DbConfig::new("tread.db")                                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config).await                                            │
//! │       │  opens pool (WAL, NORMAL sync, foreign keys ON)                 │
//! │       │  applies pending migrations                                     │
//! │       ▼                                                                 │
//! │  Database ──► companies() / products() / ledger() / invoices()          │
//! │              repository handles, each a cheap clone of the pool         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! WAL keeps readers and writers out of each other's way, which matters
//! because barcode lookups happen constantly while invoices commit.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::company::CompanyRepository;
use crate::repository::invoice::InvoiceRepository;
use crate::repository::ledger::LedgerRepository;
use crate::repository::product::ProductRepository;

// =============================================================================
// Configuration
// =============================================================================

/// Pool settings plus the database location.
///
/// Construct with [`DbConfig::new`] and override the defaults you care about:
///
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/tread/tread.db").max_connections(8);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// File path, or `:memory:` for an ephemeral test database.
    pub database_path: PathBuf,

    /// Upper bound on pooled connections (default 5, plenty for a back office).
    pub max_connections: u32,

    /// Connections kept open even when idle (default 1).
    pub min_connections: u32,

    /// How long an acquire may wait before giving up (default 30s).
    pub connect_timeout: Duration,

    /// Idle time after which a surplus connection is dropped (default 10min).
    pub idle_timeout: Duration,

    /// Apply pending migrations during `Database::new` (default true).
    pub run_migrations: bool,
}

impl DbConfig {
    /// Configuration with defaults for an on-disk database at `path`.
    ///
    /// The file is created on first connect if it does not exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            run_migrations: true,
        }
    }

    /// Overrides the pool's connection cap.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Overrides how many connections stay open while idle.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Overrides the acquire timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Enables or disables automatic migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Configuration for an isolated in-memory database, used by tests.
    ///
    /// An in-memory SQLite database exists per connection, so the pool is
    /// pinned to exactly one connection and `min_connections` keeps it from
    /// being reaped. Transactional code must never acquire a second
    /// connection while one is held.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            run_migrations: true,
        }
    }

    fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == ":memory:"
    }
}

// =============================================================================
// Database
// =============================================================================

/// Handle to the connection pool; the entry point for all storage access.
///
/// Cloning is cheap (the pool is an `Arc` internally), and each repository
/// accessor returns an owned handle, so `Database` can be shared freely
/// across tasks. There is no shared mutable state here: all coordination
/// happens inside SQLite transactions.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the pool and prepares the database for use.
    ///
    /// Establishes the SQLite session options every connection needs (WAL
    /// journal, NORMAL synchronous, foreign keys on, create-if-missing) and
    /// then applies pending migrations unless the config opts out.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Opening SQLite pool"
        );

        // ":memory:" must not go through the URL path: some platforms would
        // try to create a file literally named `:memory:`.
        let connect_options = if config.is_in_memory() {
            SqliteConnectOptions::new().in_memory(true)
        } else {
            let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());
            SqliteConnectOptions::from_str(&connect_url)
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
        };

        // WAL so reads never queue behind an open write transaction.
        // NORMAL sync trades the last commit on power loss for speed;
        // foreign keys are off by default in SQLite and we want them on.
        let connect_options = connect_options
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .create_if_missing(true);

        debug!("Session options set");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(max_connections = config.max_connections, "Pool online");

        let db = Database { pool };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Applies pending migrations.
    ///
    /// Idempotent; already-applied versions are tracked in `_sqlx_migrations`
    /// and skipped. `new()` calls this automatically unless disabled.
    pub async fn run_migrations(&self) -> DbResult<()> {
        info!("Applying pending migrations");
        migrations::run_migrations(&self.pool).await?;
        info!("Schema up to date");
        Ok(())
    }

    /// Raw pool access, for queries the repositories don't cover.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Returns the company repository (companies, warehouses, stores).
    pub fn companies(&self) -> CompanyRepository {
        CompanyRepository::new(self.pool.clone())
    }

    /// Returns the product repository (products, buckets, boxes, intake).
    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone())
    }

    /// Returns the stock ledger (lookup and exhibition moves).
    pub fn ledger(&self) -> LedgerRepository {
        LedgerRepository::new(self.pool.clone())
    }

    /// Returns the invoice repository (staging, close, returns).
    pub fn invoices(&self) -> InvoiceRepository {
        InvoiceRepository::new(self.pool.clone())
    }

    /// Drains and closes the pool; call on shutdown.
    pub async fn close(&self) {
        info!("Draining connection pool");
        self.pool.close().await;
    }

    /// True when the database answers a trivial query.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_pool_comes_up_healthy() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.health_check().await);

        db.close().await;
        assert!(!db.health_check().await);
    }

    #[tokio::test]
    async fn test_config_overrides() {
        let config = DbConfig::new("/tmp/tread-test.db")
            .max_connections(10)
            .min_connections(2)
            .run_migrations(false);

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert!(!config.run_migrations);
        assert!(!config.is_in_memory());

        let mem = DbConfig::in_memory();
        assert!(mem.is_in_memory());
        assert_eq!(mem.max_connections, 1);
    }
}
