//! # Domain Types
//!
//! The vocabulary every other module speaks.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Company ──owns──► Warehouse ──holds──► Product ──► SizeBucket         │
//! │     │                  │                   │            (qty+barcodes) │
//! │     │                  └──holds──► BoxUnit │                           │
//! │     │                                      └──► ExhibitionSlot (store) │
//! │     └──owns──► Store ──issues──► Invoice                               │
//! │                                     │                                   │
//! │                     open: StagedItem (temporary, origin-tagged)        │
//! │                     closed: InvoiceItem (permanent, earn recorded)     │
//! │                                                                         │
//! │  StockUnit: one row per physical pair, state = where it lives          │
//! │  UnitOrigin: tagged provenance every staged item carries               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Documents carry two identifiers. The `id` is a UUID v4 and is the only
//! thing rows relate on; the business identifier (barcode, invoice number)
//! is formatted for humans and scanners by the generator and is never a
//! relation key. Renumbering a box therefore cannot orphan anything.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Unit State
// =============================================================================

/// Where a physical unit currently lives.
///
/// A barcode is in exactly one state at a time; transitions between states
/// are the stock ledger's whole job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum UnitState {
    /// Counted in its product's size bucket.
    Warehouse,
    /// On display at a store (outside bucket counts).
    Exhibition,
    /// Inside an open invoice's staging area.
    Staged,
    /// Embedded in a closed invoice.
    Sold,
}

impl UnitState {
    /// Returns the lowercase label stored in the database.
    pub const fn as_str(&self) -> &'static str {
        match self {
            UnitState::Warehouse => "warehouse",
            UnitState::Exhibition => "exhibition",
            UnitState::Staged => "staged",
            UnitState::Sold => "sold",
        }
    }
}

// =============================================================================
// Unit Origin
// =============================================================================

/// Discriminant of [`UnitOrigin`], stored as its own column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum OriginKind {
    Warehouse,
    Exhibition,
    Box,
}

/// Where an invoice item came from, so a return knows where to put it back.
///
/// ## Why a Tagged Enum
/// The predecessor encoded origin as a bag of optional fields and guessed
/// the source from which ones were set. Matching on this enum is exhaustive:
/// adding a new origin forces every return path to handle it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnitOrigin {
    /// Taken from a warehouse size bucket.
    Warehouse { warehouse_id: String, size: String },
    /// Taken from a store's exhibition slot. Carries the owning warehouse
    /// too: a post-close return needs it and the item row is the only
    /// place left to remember it.
    Exhibition {
        warehouse_id: String,
        store_id: String,
        size: String,
    },
    /// A sealed box consumed whole.
    Box { warehouse_id: String },
}

impl UnitOrigin {
    /// Returns the discriminant for storage.
    pub const fn kind(&self) -> OriginKind {
        match self {
            UnitOrigin::Warehouse { .. } => OriginKind::Warehouse,
            UnitOrigin::Exhibition { .. } => OriginKind::Exhibition,
            UnitOrigin::Box { .. } => OriginKind::Box,
        }
    }

    /// Returns the warehouse the unit ultimately belongs to.
    pub fn warehouse_id(&self) -> &str {
        match self {
            UnitOrigin::Warehouse { warehouse_id, .. }
            | UnitOrigin::Exhibition { warehouse_id, .. }
            | UnitOrigin::Box { warehouse_id } => warehouse_id,
        }
    }

    /// Returns the exhibition store, if the unit came off a display slot.
    pub fn exhibition_store_id(&self) -> Option<&str> {
        match self {
            UnitOrigin::Exhibition { store_id, .. } => Some(store_id),
            _ => None,
        }
    }

    /// Reassembles an origin from its storage columns.
    ///
    /// Returns `None` when the columns are incomplete (legacy rows written
    /// before origin tracking); such items cannot be returned.
    pub fn from_parts(
        kind: OriginKind,
        warehouse_id: Option<String>,
        store_id: Option<String>,
        size: Option<String>,
    ) -> Option<Self> {
        let warehouse_id = warehouse_id?;
        match kind {
            OriginKind::Warehouse => Some(UnitOrigin::Warehouse {
                warehouse_id,
                size: size?,
            }),
            OriginKind::Exhibition => Some(UnitOrigin::Exhibition {
                warehouse_id,
                store_id: store_id?,
                size: size?,
            }),
            OriginKind::Box => Some(UnitOrigin::Box { warehouse_id }),
        }
    }
}

// =============================================================================
// Tenancy
// =============================================================================

/// A tenant. Owns everything below it; data never crosses companies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Company {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A physical storage location for a company's stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Warehouse {
    pub id: String,
    pub company_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A retail location. Issues invoices and hosts exhibition slots.
///
/// The store's invoice-number letter is not stored: it is derived from the
/// store's position among the company's store ids sorted ascending.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Store {
    pub id: String,
    pub company_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Stock
// =============================================================================

/// The per-size view of a product's warehouse stock.
///
/// ## Invariant
/// At rest, `quantity == barcodes.len()` and both are positive; a bucket
/// that reaches zero is removed from the map entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SizeBucket {
    pub quantity: i64,
    pub barcodes: Vec<String>,
}

/// One store's display unit for a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExhibitionSlot {
    pub size: String,
    pub barcode: String,
}

/// A shoe model in one color at one warehouse.
///
/// `total_units` is a maintained aggregate, always equal to the sum of
/// bucket quantities (exhibition units are display stock and excluded).
/// `box_number`/`box_position` persist the product's barcode run so that
/// later intake continues the sequence instead of restarting at 01.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    pub id: String,
    pub company_id: String,
    pub warehouse_id: String,
    pub brand: String,
    pub reference: String,
    pub color: String,
    pub sale_price_cents: i64,
    pub base_price_cents: i64,
    pub total_units: i64,
    pub box_number: Option<i64>,
    pub box_position: Option<i64>,
    /// size → bucket, assembled from `size_buckets` and unit rows.
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    pub sizes: BTreeMap<String, SizeBucket>,
    /// store_id → slot, assembled from exhibition-state unit rows.
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    pub exhibition: BTreeMap<String, ExhibitionSlot>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the list sale price as Money.
    #[inline]
    pub fn sale_price(&self) -> Money {
        Money::from_cents(self.sale_price_cents)
    }

    /// Returns the acquisition (base) price as Money.
    #[inline]
    pub fn base_price(&self) -> Money {
        Money::from_cents(self.base_price_cents)
    }
}

/// Input for creating a product with its initial stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub company_id: String,
    pub warehouse_id: String,
    pub brand: String,
    pub reference: String,
    pub color: String,
    pub sale_price_cents: i64,
    pub base_price_cents: i64,
    /// size → initial unit count. Barcodes are generated at intake.
    pub sizes: BTreeMap<String, i64>,
}

/// One row per physical pair, keyed by barcode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockUnit {
    pub barcode: String,
    pub company_id: String,
    pub product_id: String,
    pub size: String,
    pub state: UnitState,
    /// Set exactly while `state` is [`UnitState::Exhibition`].
    pub store_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A sealed multi-unit box sold as a whole.
///
/// Consuming a box zeroes `quantity` rather than deleting the row, so the
/// document stays inspectable and a return can re-write it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct BoxUnit {
    pub id: String,
    pub company_id: String,
    pub warehouse_id: String,
    pub brand: String,
    pub reference: String,
    pub color: String,
    pub sale_price_cents: i64,
    pub base_price_cents: i64,
    pub barcode: String,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BoxUnit {
    #[inline]
    pub fn sale_price(&self) -> Money {
        Money::from_cents(self.sale_price_cents)
    }

    #[inline]
    pub fn base_price(&self) -> Money {
        Money::from_cents(self.base_price_cents)
    }

    /// A consumed box is one that has been added to an invoice.
    #[inline]
    pub const fn is_consumed(&self) -> bool {
        self.quantity == 0
    }
}

/// Input for creating a sealed box.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBox {
    pub company_id: String,
    pub warehouse_id: String,
    pub brand: String,
    pub reference: String,
    pub color: String,
    pub sale_price_cents: i64,
    pub base_price_cents: i64,
    pub quantity: i64,
}

// =============================================================================
// Lookup Result
// =============================================================================

/// What a successful barcode lookup returns: the unit or box plus enough
/// snapshot data to stage it on an invoice without re-reading its source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocatedUnit {
    pub barcode: String,
    /// Product id for unit origins, box id for box origins.
    pub product_id: String,
    pub brand: String,
    pub reference: String,
    pub color: String,
    /// `None` for boxes (a box spans sizes).
    pub size: Option<String>,
    pub sale_price_cents: i64,
    pub base_price_cents: i64,
    /// 1 for single units, the remaining box count for boxes.
    pub quantity: i64,
    pub origin: UnitOrigin,
}

// =============================================================================
// Invoice Status
// =============================================================================

/// The lifecycle state of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Items can be staged, priced, and removed.
    Open,
    /// Terminal. Items are embedded; only per-item returns remain.
    Closed,
}

impl InvoiceStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Open => "open",
            InvoiceStatus::Closed => "closed",
        }
    }
}

impl Default for InvoiceStatus {
    fn default() -> Self {
        InvoiceStatus::Open
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Invoice
// =============================================================================

/// A sales document issued by one store.
///
/// `invoice_number` is assigned at close; an open invoice has none.
/// Totals count sold items only: while open they are recomputed from the
/// staged list, after close they are decremented by returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Invoice {
    pub id: String,
    pub company_id: String,
    pub store_id: String,
    pub invoice_number: Option<String>,
    pub status: InvoiceStatus,
    pub total_sold_cents: i64,
    pub total_earn_cents: i64,
    pub assigned_user: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Invoice {
    #[inline]
    pub fn total_sold(&self) -> Money {
        Money::from_cents(self.total_sold_cents)
    }

    #[inline]
    pub fn total_earn(&self) -> Money {
        Money::from_cents(self.total_earn_cents)
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.status == InvoiceStatus::Open
    }
}

// =============================================================================
// Invoice Items
// =============================================================================

/// A line in an open invoice's staging area.
///
/// Uses the snapshot pattern: product details are frozen at add time so the
/// line survives later edits (or deletion) of its source. `sale_price_cents`
/// starts at the product's list price and is overwritten by mark-sold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagedItem {
    pub id: String,
    pub invoice_id: String,
    pub company_id: String,
    pub product_id: String,
    pub brand: String,
    pub reference: String,
    pub color: String,
    /// `None` for box lines.
    pub size: Option<String>,
    pub barcode: String,
    pub sale_price_cents: i64,
    pub base_price_cents: i64,
    pub sold: bool,
    pub sold_at: Option<DateTime<Utc>>,
    pub added_at: DateTime<Utc>,
    /// 1 for single units, the box count for box lines.
    pub quantity: i64,
    pub origin: UnitOrigin,
    pub assigned_user: Option<String>,
}

impl StagedItem {
    #[inline]
    pub fn sale_price(&self) -> Money {
        Money::from_cents(self.sale_price_cents)
    }

    #[inline]
    pub fn base_price(&self) -> Money {
        Money::from_cents(self.base_price_cents)
    }

    /// The line's contribution to total_sold once marked sold.
    #[inline]
    pub fn line_value(&self) -> Money {
        self.sale_price() * self.quantity
    }

    /// The line's contribution to total_earn once marked sold.
    #[inline]
    pub fn line_earn(&self) -> Money {
        self.sale_price().margin_over(self.base_price()) * self.quantity
    }
}

/// A permanent line of a closed invoice.
///
/// `earn_cents` is fixed at close. `origin` is `None` on rows imported from
/// before origin tracking; those lines cannot be returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub id: String,
    pub invoice_id: String,
    pub company_id: String,
    pub product_id: String,
    pub brand: String,
    pub reference: String,
    pub color: String,
    pub size: Option<String>,
    pub barcode: String,
    pub sale_price_cents: i64,
    pub base_price_cents: i64,
    pub earn_cents: i64,
    pub quantity: i64,
    pub origin: Option<UnitOrigin>,
    pub returned: bool,
    pub returned_at: Option<DateTime<Utc>>,
    pub added_at: DateTime<Utc>,
    pub assigned_user: Option<String>,
}

impl InvoiceItem {
    #[inline]
    pub fn sale_price(&self) -> Money {
        Money::from_cents(self.sale_price_cents)
    }

    #[inline]
    pub fn earn(&self) -> Money {
        Money::from_cents(self.earn_cents)
    }

    /// The amount a return subtracts from the invoice's total_sold.
    #[inline]
    pub fn line_value(&self) -> Money {
        self.sale_price() * self.quantity
    }
}

// =============================================================================
// Return Outcome
// =============================================================================

/// How a post-close return ended.
///
/// `SourceMissing` is a success, not an error: the invoice side is fully
/// reversed, but the unit had nowhere to go because its product or box row
/// no longer exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnOutcome {
    /// Stock was restored to the recorded origin.
    Restored,
    /// Invoice reversed, but the originating product/box is gone.
    SourceMissing,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_kind_and_warehouse() {
        let origin = UnitOrigin::Exhibition {
            warehouse_id: "wh-1".to_string(),
            store_id: "store-1".to_string(),
            size: "38".to_string(),
        };
        assert_eq!(origin.kind(), OriginKind::Exhibition);
        assert_eq!(origin.warehouse_id(), "wh-1");
        assert_eq!(origin.exhibition_store_id(), Some("store-1"));

        let origin = UnitOrigin::Box {
            warehouse_id: "wh-2".to_string(),
        };
        assert_eq!(origin.kind(), OriginKind::Box);
        assert_eq!(origin.exhibition_store_id(), None);
    }

    #[test]
    fn test_origin_from_parts() {
        let origin = UnitOrigin::from_parts(
            OriginKind::Warehouse,
            Some("wh-1".to_string()),
            None,
            Some("40".to_string()),
        );
        assert_eq!(
            origin,
            Some(UnitOrigin::Warehouse {
                warehouse_id: "wh-1".to_string(),
                size: "40".to_string(),
            })
        );

        // Incomplete legacy rows reassemble to None
        assert_eq!(
            UnitOrigin::from_parts(OriginKind::Warehouse, Some("wh-1".to_string()), None, None),
            None
        );
        assert_eq!(
            UnitOrigin::from_parts(
                OriginKind::Exhibition,
                Some("wh-1".to_string()),
                None,
                Some("40".to_string())
            ),
            None
        );
        assert_eq!(
            UnitOrigin::from_parts(OriginKind::Box, None, None, None),
            None
        );
    }

    #[test]
    fn test_origin_serde_tagging() {
        let origin = UnitOrigin::Warehouse {
            warehouse_id: "wh-1".to_string(),
            size: "38".to_string(),
        };
        let json = serde_json::to_string(&origin).unwrap();
        assert!(json.contains(r#""kind":"warehouse""#));

        let back: UnitOrigin = serde_json::from_str(&json).unwrap();
        assert_eq!(back, origin);
    }

    #[test]
    fn test_invoice_status_default_and_display() {
        assert_eq!(InvoiceStatus::default(), InvoiceStatus::Open);
        assert_eq!(InvoiceStatus::Closed.to_string(), "closed");
    }

    #[test]
    fn test_staged_item_line_math() {
        let item = StagedItem {
            id: "it-1".to_string(),
            invoice_id: "inv-1".to_string(),
            company_id: "co-1".to_string(),
            product_id: "prod-1".to_string(),
            brand: "Runner".to_string(),
            reference: "RX-9".to_string(),
            color: "white".to_string(),
            size: None,
            barcode: "260815000001000000".to_string(),
            sale_price_cents: 100_000,
            base_price_cents: 60_000,
            sold: true,
            sold_at: None,
            added_at: Utc::now(),
            quantity: 6,
            origin: UnitOrigin::Box {
                warehouse_id: "wh-1".to_string(),
            },
            assigned_user: None,
        };

        assert_eq!(item.line_value().cents(), 600_000);
        assert_eq!(item.line_earn().cents(), 240_000);
    }

    #[test]
    fn test_box_is_consumed() {
        let mut b = BoxUnit {
            id: "box-1".to_string(),
            company_id: "co-1".to_string(),
            warehouse_id: "wh-1".to_string(),
            brand: "Runner".to_string(),
            reference: "RX-9".to_string(),
            color: "white".to_string(),
            sale_price_cents: 90_000,
            base_price_cents: 50_000,
            barcode: "260815000002000000".to_string(),
            quantity: 12,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(!b.is_consumed());
        b.quantity = 0;
        assert!(b.is_consumed());
    }
}
