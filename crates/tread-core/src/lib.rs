//! # tread-core
//!
//! The rules of the Tread inventory system, with none of its plumbing.
//!
//! Everything here is a pure function over plain data: barcode math,
//! invoice totals, validation, and the domain types they operate on.
//! Nothing in this crate opens a database, reads a clock, or logs: dates
//! arrive as arguments and results come back as values, which is what
//! makes these rules testable in microseconds and reusable from any
//! frontend the storage layer grows.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Callers (API / tooling)                              │
//! │        scan barcode ──► stage item ──► mark sold ──► close              │
//! └─────────────────────────────────┬───────────────────────────────────────┘
//!                                   │
//! ┌─────────────────────────────────▼───────────────────────────────────────┐
//! │  tread-core                                                             │
//! │                                                                         │
//! │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌────────────┐          │
//! │   │   types   │  │  barcode  │  │  totals   │  │ validation │          │
//! │   │  Product  │  │ unit/box  │  │ recompute │  │   field    │          │
//! │   │  Invoice  │  │ invoice#  │  │ reverse   │  │   checks   │          │
//! │   │ UnitOrigin│  │ runs      │  │           │  │            │          │
//! │   └───────────┘  └───────────┘  └───────────┘  └────────────┘          │
//! │                                                                         │
//! │   no I/O, no clock, no allocation of identifiers                        │
//! └─────────────────────────────────┬───────────────────────────────────────┘
//!                                   │
//! ┌─────────────────────────────────▼───────────────────────────────────────┐
//! │  tread-db: SQLite ledger, counters, repositories, migrations            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - the domain vocabulary: `Product`, `Invoice`, `UnitOrigin`, ...
//! - [`money`] - `i64` minor-unit money, no floats anywhere
//! - [`barcode`] - unit/box barcode and invoice-number formats, runs, parsing
//! - [`totals`] - invoice totals, recomputed forward and reversed on return
//! - [`error`] - `CoreError` and `ValidationError`
//! - [`validation`] - field checks that run before anything writes
//!
//! ## Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use tread_core::barcode::{invoice_number, unit_barcode};
//!
//! let date = NaiveDate::from_ymd_opt(2026, 8, 15).unwrap();
//!
//! // Barcode for box run 123, position 7
//! assert_eq!(unit_barcode(date, 123, 7), "26081500012307");
//!
//! // First invoice of the day at the company's 'A' store
//! assert_eq!(invoice_number(date, 'A', 1), "260815A001");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod barcode;
pub mod error;
pub mod money;
pub mod totals;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use tread_core::Money` instead of
// `use tread_core::money::Money`

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use totals::InvoiceTotals;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Highest position a box run can stamp before rolling to a new box number.
///
/// Positions are two digits, 01-99. Position 100 never exists: the 99 → new
/// box boundary allocates a fresh box number and restarts at 01.
pub const MAX_BOX_POSITION: i64 = 99;

/// Number of store letters available for invoice numbers (A-Z).
///
/// The letter encodes the store's position among the company's store ids
/// sorted ascending; a 27th store has no representation and is rejected with
/// a typed error rather than wrapping into punctuation.
pub const STORE_LETTER_SPACE: usize = 26;

/// Maximum units accepted in one intake or box.
///
/// ## Business Reason
/// Prevents accidental over-entry (e.g., typing 1000 instead of 10).
/// Can be made configurable per-company in future versions.
pub const MAX_INTAKE_QUANTITY: i64 = 999;

/// Maximum length of descriptive labels (brand, reference, color, names).
pub const MAX_LABEL_LEN: usize = 100;
