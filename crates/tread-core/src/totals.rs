//! # Invoice Totals
//!
//! Pure recomputation of an invoice's running totals.
//!
//! ## Two Strategies, On Purpose
//! ```text
//! While OPEN:   totals = recompute_totals(all staged items)
//!               (every mark-sold recomputes from scratch; idempotent)
//!
//! After CLOSE:  totals -= the returned item's contribution
//!               (reverse_item; the staged list no longer exists)
//! ```
//! Only items flagged sold contribute. A box line contributes price × its
//! unit count; a single pair contributes price × 1.

use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::{InvoiceItem, StagedItem};

/// An invoice's two running figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct InvoiceTotals {
    /// Sum of sale price × quantity over sold items.
    pub total_sold_cents: i64,
    /// Sum of (sale − base) × quantity over sold items.
    pub total_earn_cents: i64,
}

impl InvoiceTotals {
    pub const fn new(total_sold_cents: i64, total_earn_cents: i64) -> Self {
        InvoiceTotals {
            total_sold_cents,
            total_earn_cents,
        }
    }

    #[inline]
    pub fn total_sold(&self) -> Money {
        Money::from_cents(self.total_sold_cents)
    }

    #[inline]
    pub fn total_earn(&self) -> Money {
        Money::from_cents(self.total_earn_cents)
    }
}

/// Recomputes both totals from the full staged list.
///
/// Pure function of its input: applying it twice to the same list yields
/// the same totals, which is what lets mark-sold call it after every price
/// change without drift.
pub fn recompute_totals(items: &[StagedItem]) -> InvoiceTotals {
    let mut sold = Money::zero();
    let mut earn = Money::zero();

    for item in items.iter().filter(|i| i.sold) {
        sold += item.line_value();
        earn += item.line_earn();
    }

    InvoiceTotals::new(sold.cents(), earn.cents())
}

/// Subtracts one closed line's contribution from persisted totals.
///
/// Used by post-close returns, where the staged list is gone and the
/// embedded line is the only record of what it contributed.
pub fn reverse_item(totals: InvoiceTotals, item: &InvoiceItem) -> InvoiceTotals {
    let sold = totals.total_sold() - item.line_value();
    let earn = totals.total_earn() - item.earn();
    InvoiceTotals::new(sold.cents(), earn.cents())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UnitOrigin;
    use chrono::Utc;

    fn staged(sale: i64, base: i64, qty: i64, sold: bool) -> StagedItem {
        StagedItem {
            id: "it-1".to_string(),
            invoice_id: "inv-1".to_string(),
            company_id: "co-1".to_string(),
            product_id: "prod-1".to_string(),
            brand: "Runner".to_string(),
            reference: "RX-9".to_string(),
            color: "white".to_string(),
            size: Some("40".to_string()),
            barcode: "26081500000101".to_string(),
            sale_price_cents: sale,
            base_price_cents: base,
            sold,
            sold_at: None,
            added_at: Utc::now(),
            quantity: qty,
            origin: UnitOrigin::Warehouse {
                warehouse_id: "wh-1".to_string(),
                size: "40".to_string(),
            },
            assigned_user: None,
        }
    }

    #[test]
    fn test_recompute_counts_only_sold() {
        let items = vec![
            staged(100_000, 60_000, 1, true),
            staged(80_000, 50_000, 1, false),
        ];

        let totals = recompute_totals(&items);
        assert_eq!(totals.total_sold_cents, 100_000);
        assert_eq!(totals.total_earn_cents, 40_000);
    }

    #[test]
    fn test_recompute_weights_box_quantity() {
        let items = vec![staged(90_000, 50_000, 6, true)];

        let totals = recompute_totals(&items);
        assert_eq!(totals.total_sold_cents, 540_000);
        assert_eq!(totals.total_earn_cents, 240_000);
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let items = vec![
            staged(100_000, 60_000, 1, true),
            staged(90_000, 50_000, 6, true),
            staged(70_000, 70_000, 1, false),
        ];

        let once = recompute_totals(&items);
        let twice = recompute_totals(&items);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_recompute_empty_is_zero() {
        let totals = recompute_totals(&[]);
        assert_eq!(totals, InvoiceTotals::default());
    }

    #[test]
    fn test_reverse_item_subtracts_exact_contribution() {
        let item = InvoiceItem {
            id: "it-1".to_string(),
            invoice_id: "inv-1".to_string(),
            company_id: "co-1".to_string(),
            product_id: "prod-1".to_string(),
            brand: "Runner".to_string(),
            reference: "RX-9".to_string(),
            color: "white".to_string(),
            size: Some("40".to_string()),
            barcode: "26081500000101".to_string(),
            sale_price_cents: 100_000,
            base_price_cents: 60_000,
            earn_cents: 40_000,
            quantity: 1,
            origin: None,
            returned: false,
            returned_at: None,
            added_at: Utc::now(),
            assigned_user: None,
        };

        let totals = InvoiceTotals::new(250_000, 90_000);
        let after = reverse_item(totals, &item);
        assert_eq!(after.total_sold_cents, 150_000);
        assert_eq!(after.total_earn_cents, 50_000);

        // Returning the only item zeroes the invoice
        let only = reverse_item(InvoiceTotals::new(100_000, 40_000), &item);
        assert_eq!(only, InvoiceTotals::default());
    }
}
