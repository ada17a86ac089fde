//! # Error Types
//!
//! The two error enums the domain layer can produce.
//!
//! `ValidationError` fires before any logic runs (bad input shape);
//! `CoreError` fires when well-formed input breaks a business rule. The
//! storage crate wraps both under its own error type:
//!
//! ```text
//! ValidationError ──#[from]──► CoreError ──#[from]──► DbError (tread-db)
//! ```
//!
//! A failed barcode *lookup* is not an error (lookups return `Option`), so
//! every variant here marks a rule actually violated, with enough context
//! (barcode, invoice id, counts) to tell the operator what to fix.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations.
///
/// Variants carry the identifiers the message needs; none of them carry
/// state, so they are cheap to construct on rejected paths.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Box not found: {0}")]
    BoxNotFound(String),

    #[error("Store not found: {0}")]
    StoreNotFound(String),

    /// No stock unit with this barcode is in a consumable state.
    ///
    /// Fires for mistyped barcodes, barcodes from another company, and
    /// units already staged on an open invoice or sold.
    #[error("Unit not found: {barcode}")]
    UnitNotFound { barcode: String },

    #[error("Invoice not found: {0}")]
    InvoiceNotFound(String),

    /// The invoice exists but has no such line.
    #[error("Invoice {invoice_id} has no item {item}")]
    ItemNotFound { invoice_id: String, item: String },

    /// One exhibition unit per product per store; the occupied slot must be
    /// recalled before a different unit can take its place.
    #[error("Product {product_id} already has an exhibition unit at store {store_id}")]
    SlotOccupied {
        product_id: String,
        store_id: String,
    },

    /// The box's quantity already reached zero.
    #[error("Box {barcode} has already been sold")]
    BoxConsumed { barcode: String },

    /// Staging operations (add, price, close, delete) need an open invoice.
    #[error("Invoice {invoice_id} is {status}, expected open")]
    InvoiceNotOpen { invoice_id: String, status: String },

    /// Post-close returns need a closed invoice.
    #[error("Invoice {invoice_id} is {status}, expected closed")]
    InvoiceNotClosed { invoice_id: String, status: String },

    /// Closing an invoice with nothing staged.
    #[error("Invoice {0} has no items to close")]
    EmptyInvoice(String),

    /// Closing while staged lines remain unsold. The count goes into the
    /// message so the operator knows how many scans are left to price.
    #[error("Invoice {invoice_id} has {unsold} unsold item(s); all products must be marked as sold")]
    UnsoldItems { invoice_id: String, unsold: usize },

    /// A line can be returned once.
    #[error("Item {barcode} has already been returned")]
    AlreadyReturned { barcode: String },

    /// The closed line predates origin tracking, so there is nowhere to
    /// route the unit back to. Rejected before any write happens.
    #[error("Item {barcode} is missing its return context and cannot be returned")]
    MissingReturnContext { barcode: String },

    /// Invoice numbers encode the store as one letter A-Z; the 27th store
    /// has no representation.
    #[error("Company has {count} stores, exceeding the 26 store-letter codes")]
    StoreLetterExhausted { count: usize },

    /// Input failed validation before any rule was evaluated.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Rejected input, reported against the offending field by name.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Malformed value: bad UUID, size label with rejected characters, ...
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience alias for fallible domain operations.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_operator_context() {
        let err = CoreError::UnsoldItems {
            invoice_id: "inv-1".to_string(),
            unsold: 2,
        };
        assert_eq!(
            err.to_string(),
            "Invoice inv-1 has 2 unsold item(s); all products must be marked as sold"
        );

        let err = CoreError::SlotOccupied {
            product_id: "prod-1".to_string(),
            store_id: "store-1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Product prod-1 already has an exhibition unit at store store-1"
        );

        let err = CoreError::StoreLetterExhausted { count: 27 };
        assert_eq!(
            err.to_string(),
            "Company has 27 stores, exceeding the 26 store-letter codes"
        );
    }

    #[test]
    fn test_validation_messages_name_the_field() {
        let err = ValidationError::Required {
            field: "brand".to_string(),
        };
        assert_eq!(err.to_string(), "brand is required");

        let err = ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: 999,
        };
        assert_eq!(err.to_string(), "quantity must be between 1 and 999");
    }

    #[test]
    fn test_validation_escalates_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "brand".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert!(core_err.to_string().starts_with("Validation error:"));
    }
}
