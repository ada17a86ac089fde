//! # Database Migrations
//!
//! Embedded migration runner for schema evolution.
//!
//! ## How It Works
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Migration System                                   │
//! │                                                                         │
//! │  Compile time:                                                          │
//! │  migrations/sqlite/*.sql ──► embedded into the binary via migrate!()   │
//! │                                                                         │
//! │  Runtime (on Database::new):                                            │
//! │  1. Read _sqlx_migrations table (created if missing)                    │
//! │  2. Compare applied versions against embedded ones                      │
//! │  3. Apply pending migrations, in order, each in a transaction           │
//! │  4. Record version + checksum                                           │
//! │                                                                         │
//! │  Checksum mismatch on an applied migration ──► hard error               │
//! │  (an edited migration file means the schema lineage is unknown)         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Adding A Migration
//! Create `migrations/sqlite/NNN_description.sql` with the next number.
//! Never edit an applied migration; add a new one instead.

use sqlx::migrate::Migrator;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;

/// Embedded migrations, compiled into the binary.
///
/// Path is relative to this crate's `Cargo.toml`.
static MIGRATOR: Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Runs all pending migrations against the pool.
///
/// ## Returns
/// * `Ok(())` - All migrations applied (or none pending)
/// * `Err(DbError::MigrationFailed)` - A migration failed; the database
///   is left at the last successfully applied version
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    debug!(
        embedded = MIGRATOR.iter().count(),
        "Checking for pending migrations"
    );

    MIGRATOR.run(pool).await?;

    Ok(())
}

/// Current migration status of a database.
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    /// Number of migrations embedded in this binary.
    pub embedded: usize,
    /// Number of migrations recorded as applied in the database.
    pub applied: usize,
}

impl MigrationStatus {
    /// True when the database schema matches this binary.
    pub fn is_up_to_date(&self) -> bool {
        self.applied >= self.embedded
    }
}

/// Reports how many migrations are embedded vs applied.
///
/// Useful for startup logging and health endpoints.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<MigrationStatus> {
    let embedded = MIGRATOR.iter().count();

    let applied: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    let status = MigrationStatus {
        embedded,
        applied: applied as usize,
    };

    info!(
        embedded = status.embedded,
        applied = status.applied,
        up_to_date = status.is_up_to_date(),
        "Migration status"
    );

    Ok(status)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_migrations_apply_cleanly() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let status = migration_status(db.pool()).await.unwrap();
        assert!(status.embedded >= 1);
        assert!(status.is_up_to_date());
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        // Second run is a no-op, not an error.
        run_migrations(db.pool()).await.unwrap();
        run_migrations(db.pool()).await.unwrap();
    }
}
