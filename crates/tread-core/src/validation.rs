//! # Input Validation
//!
//! Field checks that run before anything is written or allocated.
//!
//! Repositories call these on their way into a transaction; a rejected
//! input therefore mutates nothing and burns no counter values. The
//! database's own NOT NULL / CHECK / UNIQUE constraints back these checks
//! up, but a `ValidationError` names the offending field, which a
//! constraint failure cannot.

use crate::error::ValidationError;
use crate::types::{NewBox, NewProduct};
use crate::{MAX_INTAKE_QUANTITY, MAX_LABEL_LEN};

/// Alias for individual field checks.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Checks a descriptive label (brand, reference, color, names): non-blank
/// after trimming, at most 100 characters.
pub fn validate_label(field: &'static str, value: &str) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.len() > MAX_LABEL_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_LABEL_LEN,
        });
    }

    Ok(())
}

/// Checks a size label.
///
/// Sizes end up inside barcoded bucket keys, so the alphabet is tight:
/// letters, digits, `.`, `/` and `-`, at most 10 characters. Covers the
/// shapes that actually occur ("38", "9.5", "38/39", "XL").
pub fn validate_size(size: &str) -> ValidationResult<()> {
    let size = size.trim();

    if size.is_empty() {
        return Err(ValidationError::Required {
            field: "size".to_string(),
        });
    }

    if size.len() > 10 {
        return Err(ValidationError::TooLong {
            field: "size".to_string(),
            max: 10,
        });
    }

    if !size
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '/' || c == '-')
    {
        return Err(ValidationError::InvalidFormat {
            field: "size".to_string(),
            reason: "must contain only letters, digits, '.', '/' and '-'".to_string(),
        });
    }

    Ok(())
}

/// Checks that an id parses as a UUID.
///
/// Document ids are UUID v4 strings; rejecting malformed ids here gives a
/// field-level error instead of a foreign-key failure later.
pub fn validate_uuid(field: &'static str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Checks a price in minor units: anything non-negative passes, zero
/// included (giveaways happen).
///
/// The typed descendant of the old "is it a number and not NaN" check;
/// with integer money the NaN case cannot exist, only the sign rule
/// remains.
pub fn validate_price_cents(field: &'static str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Checks an intake or box quantity: 1 through 999.
///
/// A fat-fingered 10000 is a typo, not a delivery.
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_INTAKE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_INTAKE_QUANTITY,
        });
    }

    Ok(())
}

// =============================================================================
// Aggregate Validators
// =============================================================================

/// Validates a product intake before any identifier is allocated.
///
/// Checks every field and every size bucket; the first violation aborts the
/// whole intake with nothing written and no counter values burned.
pub fn validate_new_product(input: &NewProduct) -> ValidationResult<()> {
    validate_uuid("company_id", &input.company_id)?;
    validate_uuid("warehouse_id", &input.warehouse_id)?;
    validate_label("brand", &input.brand)?;
    validate_label("reference", &input.reference)?;
    validate_label("color", &input.color)?;
    validate_price_cents("sale_price", input.sale_price_cents)?;
    validate_price_cents("base_price", input.base_price_cents)?;

    for (size, qty) in &input.sizes {
        validate_size(size)?;
        validate_quantity(*qty)?;
    }

    Ok(())
}

/// Validates a box intake.
pub fn validate_new_box(input: &NewBox) -> ValidationResult<()> {
    validate_uuid("company_id", &input.company_id)?;
    validate_uuid("warehouse_id", &input.warehouse_id)?;
    validate_label("brand", &input.brand)?;
    validate_label("reference", &input.reference)?;
    validate_label("color", &input.color)?;
    validate_price_cents("sale_price", input.sale_price_cents)?;
    validate_price_cents("base_price", input.base_price_cents)?;
    validate_quantity(input.quantity)?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_validate_label() {
        assert!(validate_label("brand", "Nike").is_ok());
        assert!(validate_label("brand", "  Runner Pro  ").is_ok());

        assert!(validate_label("brand", "").is_err());
        assert!(validate_label("brand", "   ").is_err());
        assert!(validate_label("brand", &"A".repeat(200)).is_err());
    }

    #[test]
    fn test_validate_size() {
        assert!(validate_size("38").is_ok());
        assert!(validate_size("9.5").is_ok());
        assert!(validate_size("38/39").is_ok());
        assert!(validate_size("XL").is_ok());

        assert!(validate_size("").is_err());
        assert!(validate_size("38 39").is_err());
        assert!(validate_size("12345678901").is_err());
    }

    #[test]
    fn test_validate_price_cents() {
        assert!(validate_price_cents("sale_price", 0).is_ok());
        assert!(validate_price_cents("sale_price", 100_000).is_ok());
        assert!(validate_price_cents("sale_price", -1).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-3).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("company_id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("company_id", "").is_err());
        assert!(validate_uuid("company_id", "not-a-uuid").is_err());
    }

    #[test]
    fn test_validate_new_product() {
        let mut sizes = BTreeMap::new();
        sizes.insert("38".to_string(), 2i64);
        sizes.insert("40".to_string(), 1i64);

        let mut input = NewProduct {
            company_id: "550e8400-e29b-41d4-a716-446655440000".to_string(),
            warehouse_id: "550e8400-e29b-41d4-a716-446655440001".to_string(),
            brand: "Runner".to_string(),
            reference: "RX-9".to_string(),
            color: "white".to_string(),
            sale_price_cents: 100_000,
            base_price_cents: 60_000,
            sizes,
        };
        assert!(validate_new_product(&input).is_ok());

        input.base_price_cents = -1;
        assert!(validate_new_product(&input).is_err());

        input.base_price_cents = 60_000;
        input.sizes.insert("bad size".to_string(), 1);
        assert!(validate_new_product(&input).is_err());
    }

    #[test]
    fn test_validate_new_box() {
        let mut input = NewBox {
            company_id: "550e8400-e29b-41d4-a716-446655440000".to_string(),
            warehouse_id: "550e8400-e29b-41d4-a716-446655440001".to_string(),
            brand: "Runner".to_string(),
            reference: "RX-9".to_string(),
            color: "black".to_string(),
            sale_price_cents: 90_000,
            base_price_cents: 50_000,
            quantity: 12,
        };
        assert!(validate_new_box(&input).is_ok());

        input.quantity = 0;
        assert!(validate_new_box(&input).is_err());
    }
}
