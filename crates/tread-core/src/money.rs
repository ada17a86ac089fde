//! # Money
//!
//! Integer money in minor units, end to end.
//!
//! A pair priced 100000 with base 60000 must earn exactly 40000, invoice
//! after invoice, return after return. The moment a float touches a price
//! that stops being true, so prices, totals, and earns are `i64` minor
//! units in the database, in the math, and on the wire. This type keeps
//! anyone from accidentally adding a price to a quantity.
//!
//! ```text
//! Product.sale_price ──► StagedItem.sale_price ──► InvoiceTotals.total_sold
//! Product.base_price ──► margin per item (earn) ──► InvoiceTotals.total_earn
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// Signed because totals go down on returns: negatives exist transiently
/// in the arithmetic even though persisted totals never should be negative.
/// `#[serde(transparent)]` keeps the JSON representation a bare integer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Wraps a raw amount of minor units.
    ///
    /// ## Example
    /// ```rust
    /// use tread_core::money::Money;
    ///
    /// let price = Money::from_cents(100_000);
    /// assert_eq!(price.cents(), 100_000);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// The raw amount in minor units.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// A negative persisted total means the books are broken; callers use
    /// this to assert, never to branch business logic.
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Margin of this (sale) price over a base price.
    ///
    /// Selling below base yields a negative margin; the aggregator records
    /// it as-is rather than clamping (a loss is a loss).
    ///
    /// ## Example
    /// ```rust
    /// use tread_core::money::Money;
    ///
    /// let sale = Money::from_cents(100_000);
    /// let base = Money::from_cents(60_000);
    /// assert_eq!(sale.margin_over(base).cents(), 40_000);
    /// ```
    #[inline]
    pub const fn margin_over(&self, base: Money) -> Money {
        Money(self.0 - base.0)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Human-readable form for logs and the seed tool. Thousands separators and
/// currency symbols are a presentation concern, not ours.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}${}.{:02}", sign, (self.0 / 100).abs(), (self.0 % 100).abs())
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

/// Summing item contributions into a total.
impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

/// A return reversing a contribution.
impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

/// Price times quantity; box lines contribute price × count.
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrips_and_zero() {
        assert_eq!(Money::from_cents(100_000).cents(), 100_000);
        assert_eq!(Money::default(), Money::zero());
        assert!(Money::zero().is_zero());
        assert!(!Money::zero().is_negative());
        assert!(Money::from_cents(-100).is_negative());
        assert_eq!(Money::from_cents(-100).abs().cents(), 100);
    }

    #[test]
    fn test_line_arithmetic() {
        let price = Money::from_cents(90_000);
        let base = Money::from_cents(50_000);

        // A six-pair box line: value and earn scale with quantity
        assert_eq!((price * 6).cents(), 540_000);
        assert_eq!((price.margin_over(base) * 6).cents(), 240_000);

        let mut total = Money::zero();
        total += price * 6;
        total += Money::from_cents(100_000);
        assert_eq!(total.cents(), 640_000);

        // Reversal on return
        total -= price * 6;
        assert_eq!(total.cents(), 100_000);

        assert_eq!((-Money::from_cents(250)).cents(), -250);
        assert_eq!((price - base).cents(), 40_000);
        assert_eq!((price + base).cents(), 140_000);
    }

    #[test]
    fn test_margin_can_go_negative() {
        let base = Money::from_cents(60_000);
        let discounted = Money::from_cents(50_000);
        assert_eq!(discounted.margin_over(base).cents(), -10_000);
        assert!(discounted.margin_over(base).is_negative());
    }

    #[test]
    fn test_display_for_logs() {
        assert_eq!(Money::from_cents(1099).to_string(), "$10.99");
        assert_eq!(Money::from_cents(500).to_string(), "$5.00");
        assert_eq!(Money::from_cents(-550).to_string(), "-$5.50");
        assert_eq!(Money::from_cents(0).to_string(), "$0.00");
    }
}
