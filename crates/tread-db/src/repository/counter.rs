//! # Sequence Counters
//!
//! Atomic allocation of the business-identifier sequences.
//!
//! ## How Allocation Works
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  counters(company_id, scope, value)                                     │
//! │                                                                         │
//! │  next_value(tx, co, "box")                                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  INSERT .. VALUES (co, 'box', 1)                                        │
//! │  ON CONFLICT(company_id, scope) DO UPDATE SET value = value + 1         │
//! │  RETURNING value                                                        │
//! │                                                                         │
//! │  One statement: first caller creates the row at 1, every later caller  │
//! │  bumps it. No read-then-write window, no max() scan over live data.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Allocation always happens on the caller's open transaction, so a rolled
//! back intake or close rolls its sequence bump back with it. Gaps can still
//! appear in the face of a crash between commit and use, which is fine:
//! sequences promise uniqueness, not density.
//!
//! ## Scopes
//! - `box` - per company: the 6-digit box/sequence stream shared by unit
//!   barcode runs and box barcodes across all of the company's warehouses.
//! - `invoice:<store_id>` - per store: the running invoice sequence. Two
//!   stores may issue the same 3-digit suffix on the same day; the store
//!   letter disambiguates.

use sqlx::SqliteConnection;

use crate::error::DbResult;

/// Scope of the per-company box-number stream.
pub(crate) const BOX_SCOPE: &str = "box";

/// Scope of a store's invoice sequence.
pub(crate) fn invoice_scope(store_id: &str) -> String {
    format!("invoice:{store_id}")
}

/// Claims the next value of a sequence, creating it at 1 on first use.
///
/// Runs on the caller's open transaction; the claim commits or rolls back
/// with the work that needed it.
pub(crate) async fn next_value(
    conn: &mut SqliteConnection,
    company_id: &str,
    scope: &str,
) -> DbResult<i64> {
    let value: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO counters (company_id, scope, value)
        VALUES (?1, ?2, 1)
        ON CONFLICT(company_id, scope) DO UPDATE SET value = value + 1
        RETURNING value
        "#,
    )
    .bind(company_id)
    .bind(scope)
    .fetch_one(&mut *conn)
    .await?;

    Ok(value)
}

// =============================================================================
// Unit Tests
// =============================================================================
