//! # Storage Errors
//!
//! One enum for everything the storage layer can fail with.
//!
//! Repository methods return `DbResult<T>`, which covers two distinct
//! worlds in one type:
//!
//! ```text
//!   sqlx::Error ──► DbError::{NotFound, UniqueViolation, Conflict, ...}
//!   CoreError   ──► DbError::Domain (transparent, via #[from])
//! ```
//!
//! Callers that care can match `DbError::Domain(..)` to pull business-rule
//! failures apart from infrastructure failures; callers that don't get a
//! single error message either way.

use thiserror::Error;
use tread_core::CoreError;

/// Storage-layer errors, including wrapped business-rule violations.
#[derive(Debug, Error)]
pub enum DbError {
    /// A business rule said no; the database itself is fine.
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// No row for the given entity and id. Raised by lookups and by writes
    /// whose `rows_affected()` came back zero.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A UNIQUE index rejected the write (duplicate barcode, second
    /// exhibition slot for the same product and store, ...).
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// A referenced row does not exist.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// A conditional write lost a race: the row changed state between the
    /// caller's read and its guarded UPDATE.
    ///
    /// ## When This Occurs
    /// Two invoices scan the same barcode at once. Both locate the unit in
    /// `warehouse` state; the first `UPDATE .. WHERE state = 'warehouse'`
    /// wins, the second matches zero rows and lands here.
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// Could not open or reach the database.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A migration did not apply cleanly.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// The statement itself failed (syntax, type mismatch, I/O).
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Begin/commit/rollback failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Every pooled connection was busy for the whole acquire timeout.
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Anything sqlx reports that has no better bucket above.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Shorthand for [`DbError::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Shorthand for [`DbError::Conflict`], used after a guarded write
    /// matched zero rows.
    pub fn conflict(message: impl Into<String>) -> Self {
        DbError::Conflict {
            message: message.into(),
        }
    }
}

/// Classifies sqlx errors into the buckets above.
///
/// SQLite reports constraint failures as database errors with well-known
/// message prefixes rather than distinct codes, so UNIQUE and FOREIGN KEY
/// violations are recognized by message.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // "UNIQUE constraint failed: <table>.<column>"
                if let Some(field) = msg.strip_prefix("UNIQUE constraint failed: ") {
                    DbError::UniqueViolation {
                        field: field.to_string(),
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// What every repository method returns.
pub type DbResult<T> = Result<T, DbError>;
