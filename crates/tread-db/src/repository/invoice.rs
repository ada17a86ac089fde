//! # Invoice Repository
//!
//! Staging, pricing, close, and post-close returns.
//!
//! ## Invoice Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Invoice Lifecycle                                  │
//! │                                                                         │
//! │  CREATED (open, empty, no number)                                       │
//! │     └── add_item() → staged line + unit leaves stock, one transaction   │
//! │     └── remove_item() → staged line deleted + unit routed back          │
//! │     └── mark_sold() → sold flag + final price; totals RECOMPUTED        │
//! │            from the full staged list (idempotent, drift-free)           │
//! │     └── close() → all sold? assign invoice number, embed lines,         │
//! │            units → sold, staging purged. TERMINAL.                      │
//! │                                                                         │
//! │  CLOSED                                                                 │
//! │     └── return_item() → line flagged returned, totals DECREMENTED       │
//! │            by that line, stock routed back by its recorded origin       │
//! │                                                                         │
//! │  (an OPEN invoice can instead be deleted outright)                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Two totals strategies on purpose: while open, every mark-sold and every
//! removal recomputes from scratch; after close the staged list is gone, so
//! returns subtract the embedded line's recorded contribution.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::{counter, ledger};
use tread_core::barcode::invoice_number;
use tread_core::totals::{recompute_totals, reverse_item};
use tread_core::validation::validate_price_cents;
use tread_core::{
    CoreError, Invoice, InvoiceItem, InvoiceStatus, InvoiceTotals, OriginKind, ReturnOutcome,
    StagedItem, UnitOrigin, UnitState,
};

// =============================================================================
// Row Types
// =============================================================================
// Origin is stored flattened into three columns; these private row structs
// reassemble the tagged enum on the way out.

#[derive(sqlx::FromRow)]
struct StagedItemRow {
    id: String,
    invoice_id: String,
    company_id: String,
    product_id: String,
    brand: String,
    reference: String,
    color: String,
    size: Option<String>,
    barcode: String,
    sale_price_cents: i64,
    base_price_cents: i64,
    sold: bool,
    sold_at: Option<DateTime<Utc>>,
    added_at: DateTime<Utc>,
    quantity: i64,
    origin_kind: OriginKind,
    warehouse_id: String,
    exhibition_store_id: Option<String>,
    assigned_user: Option<String>,
}

impl StagedItemRow {
    /// Staged rows are written by this crate and always carry a complete
    /// origin; an incomplete one is data corruption, not a legacy row.
    fn into_item(self) -> DbResult<StagedItem> {
        let origin = UnitOrigin::from_parts(
            self.origin_kind,
            Some(self.warehouse_id),
            self.exhibition_store_id,
            self.size.clone(),
        )
        .ok_or_else(|| {
            DbError::Internal(format!("staged item {} has an incomplete origin", self.id))
        })?;

        Ok(StagedItem {
            id: self.id,
            invoice_id: self.invoice_id,
            company_id: self.company_id,
            product_id: self.product_id,
            brand: self.brand,
            reference: self.reference,
            color: self.color,
            size: self.size,
            barcode: self.barcode,
            sale_price_cents: self.sale_price_cents,
            base_price_cents: self.base_price_cents,
            sold: self.sold,
            sold_at: self.sold_at,
            added_at: self.added_at,
            quantity: self.quantity,
            origin,
            assigned_user: self.assigned_user,
        })
    }
}

#[derive(sqlx::FromRow)]
struct InvoiceItemRow {
    id: String,
    invoice_id: String,
    company_id: String,
    product_id: String,
    brand: String,
    reference: String,
    color: String,
    size: Option<String>,
    barcode: String,
    sale_price_cents: i64,
    base_price_cents: i64,
    earn_cents: i64,
    quantity: i64,
    origin_kind: Option<OriginKind>,
    warehouse_id: Option<String>,
    exhibition_store_id: Option<String>,
    returned: bool,
    returned_at: Option<DateTime<Utc>>,
    added_at: DateTime<Utc>,
    assigned_user: Option<String>,
}

impl InvoiceItemRow {
    /// Legacy rows (no origin columns) reassemble to `origin: None` and are
    /// rejected at return time, never at read time.
    fn into_item(self) -> InvoiceItem {
        let origin = self.origin_kind.and_then(|kind| {
            UnitOrigin::from_parts(
                kind,
                self.warehouse_id,
                self.exhibition_store_id,
                self.size.clone(),
            )
        });

        InvoiceItem {
            id: self.id,
            invoice_id: self.invoice_id,
            company_id: self.company_id,
            product_id: self.product_id,
            brand: self.brand,
            reference: self.reference,
            color: self.color,
            size: self.size,
            barcode: self.barcode,
            sale_price_cents: self.sale_price_cents,
            base_price_cents: self.base_price_cents,
            earn_cents: self.earn_cents,
            quantity: self.quantity,
            origin,
            returned: self.returned,
            returned_at: self.returned_at,
            added_at: self.added_at,
            assigned_user: self.assigned_user,
        }
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for invoice database operations.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

impl InvoiceRepository {
    /// Creates a new InvoiceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Create / Read / Delete
    // -------------------------------------------------------------------------

    /// Creates an open, empty invoice for a store. No number yet: invoice
    /// numbers are assigned at close.
    pub async fn create_invoice(
        &self,
        company_id: &str,
        store_id: &str,
        assigned_user: Option<&str>,
    ) -> DbResult<Invoice> {
        let owner: Option<String> =
            sqlx::query_scalar("SELECT company_id FROM stores WHERE id = ?1")
                .bind(store_id)
                .fetch_optional(&self.pool)
                .await?;

        // a store in another company is as good as no store
        match owner {
            Some(owner) if owner == company_id => {}
            _ => return Err(CoreError::StoreNotFound(store_id.to_string()).into()),
        }

        let now = Utc::now();
        let invoice = Invoice {
            id: Uuid::new_v4().to_string(),
            company_id: company_id.to_string(),
            store_id: store_id.to_string(),
            invoice_number: None,
            status: InvoiceStatus::Open,
            total_sold_cents: 0,
            total_earn_cents: 0,
            assigned_user: assigned_user.map(str::to_string),
            created_at: now,
            updated_at: now,
            closed_at: None,
        };

        debug!(id = %invoice.id, store_id = %store_id, "Creating invoice");

        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, company_id, store_id, invoice_number, status,
                total_sold_cents, total_earn_cents, assigned_user,
                created_at, updated_at, closed_at
            ) VALUES (?1, ?2, ?3, NULL, 'open', 0, 0, ?4, ?5, ?5, NULL)
            "#,
        )
        .bind(&invoice.id)
        .bind(&invoice.company_id)
        .bind(&invoice.store_id)
        .bind(&invoice.assigned_user)
        .bind(invoice.created_at)
        .execute(&self.pool)
        .await?;

        Ok(invoice)
    }

    /// Gets an invoice by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Invoice>> {
        let mut conn = self.pool.acquire().await?;
        match load_invoice(&mut conn, id).await {
            Ok(invoice) => Ok(Some(invoice)),
            Err(DbError::Domain(CoreError::InvoiceNotFound(_))) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Lists a company's invoices, newest first.
    pub async fn list_for_company(&self, company_id: &str) -> DbResult<Vec<Invoice>> {
        let invoices = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT id, company_id, store_id, invoice_number, status,
                   total_sold_cents, total_earn_cents, assigned_user,
                   created_at, updated_at, closed_at
            FROM invoices
            WHERE company_id = ?1
            ORDER BY created_at DESC
            "#,
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(invoices)
    }

    /// Gets an open invoice's staged lines, oldest first.
    pub async fn staged_items(&self, invoice_id: &str) -> DbResult<Vec<StagedItem>> {
        let mut conn = self.pool.acquire().await?;
        staged_rows(&mut conn, invoice_id).await
    }

    /// Gets a closed invoice's embedded lines, oldest first.
    pub async fn items(&self, invoice_id: &str) -> DbResult<Vec<InvoiceItem>> {
        let rows = sqlx::query_as::<_, InvoiceItemRow>(
            r#"
            SELECT id, invoice_id, company_id, product_id, brand, reference, color,
                   size, barcode, sale_price_cents, base_price_cents, earn_cents,
                   quantity, origin_kind, warehouse_id, exhibition_store_id,
                   returned, returned_at, added_at, assigned_user
            FROM invoice_items
            WHERE invoice_id = ?1
            ORDER BY added_at
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(InvoiceItemRow::into_item).collect())
    }

    /// Deletes an open invoice and its staging rows.
    ///
    /// Units the invoice had staged are NOT released: they stay in `staged`
    /// state with no invoice pointing at them. This mirrors the legacy
    /// document flow, where deleting an open invoice abandons its scans;
    /// [`remove_item`](Self::remove_item) each line first when the stock
    /// should go back on the shelf.
    pub async fn delete_invoice(&self, id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let invoice = load_invoice(&mut tx, id).await?;
        ensure_open(&invoice)?;

        let staged: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM staged_items WHERE invoice_id = ?1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;

        sqlx::query("DELETE FROM staged_items WHERE invoice_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM invoices WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(id = %id, staged_abandoned = staged, "Deleted open invoice");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Staging
    // -------------------------------------------------------------------------

    /// Stages a scanned barcode onto an open invoice.
    ///
    /// One transaction covers the whole move: the staged line appears and
    /// the unit leaves its source (bucket decrement / slot clear / box
    /// consume) together or not at all. Totals are untouched: only items
    /// marked sold count.
    pub async fn add_item(&self, invoice_id: &str, barcode: &str) -> DbResult<StagedItem> {
        debug!(invoice_id = %invoice_id, barcode = %barcode, "Staging item");

        let mut tx = self.pool.begin().await?;

        let invoice = load_invoice(&mut tx, invoice_id).await?;
        ensure_open(&invoice)?;

        let located = ledger::locate_unit(&mut tx, &invoice.company_id, barcode)
            .await?
            .ok_or_else(|| CoreError::UnitNotFound {
                barcode: barcode.to_string(),
            })?;

        match &located.origin {
            UnitOrigin::Warehouse { size, .. } => {
                ledger::transition_unit(
                    &mut tx,
                    &invoice.company_id,
                    barcode,
                    UnitState::Warehouse,
                    UnitState::Staged,
                    None,
                )
                .await?;
                ledger::debit_bucket(&mut tx, &located.product_id, size).await?;
            }
            UnitOrigin::Exhibition { .. } => {
                // buckets were already debited when the unit went on display
                ledger::transition_unit(
                    &mut tx,
                    &invoice.company_id,
                    barcode,
                    UnitState::Exhibition,
                    UnitState::Staged,
                    None,
                )
                .await?;
            }
            UnitOrigin::Box { .. } => {
                if located.quantity == 0 {
                    return Err(CoreError::BoxConsumed {
                        barcode: barcode.to_string(),
                    }
                    .into());
                }
                ledger::consume_box(&mut tx, &invoice.company_id, barcode, located.quantity)
                    .await?;
            }
        }

        let item = StagedItem {
            id: Uuid::new_v4().to_string(),
            invoice_id: invoice_id.to_string(),
            company_id: invoice.company_id.clone(),
            product_id: located.product_id,
            brand: located.brand,
            reference: located.reference,
            color: located.color,
            size: located.size,
            barcode: located.barcode,
            sale_price_cents: located.sale_price_cents,
            base_price_cents: located.base_price_cents,
            sold: false,
            sold_at: None,
            added_at: Utc::now(),
            quantity: located.quantity,
            origin: located.origin,
            assigned_user: invoice.assigned_user.clone(),
        };

        sqlx::query(
            r#"
            INSERT INTO staged_items (
                id, invoice_id, company_id, product_id, brand, reference, color,
                size, barcode, sale_price_cents, base_price_cents, sold, sold_at,
                added_at, quantity, origin_kind, warehouse_id, exhibition_store_id,
                assigned_user
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 0, NULL, ?12, ?13, ?14, ?15, ?16, ?17)
            "#,
        )
        .bind(&item.id)
        .bind(&item.invoice_id)
        .bind(&item.company_id)
        .bind(&item.product_id)
        .bind(&item.brand)
        .bind(&item.reference)
        .bind(&item.color)
        .bind(&item.size)
        .bind(&item.barcode)
        .bind(item.sale_price_cents)
        .bind(item.base_price_cents)
        .bind(item.added_at)
        .bind(item.quantity)
        .bind(item.origin.kind())
        .bind(item.origin.warehouse_id())
        .bind(item.origin.exhibition_store_id())
        .bind(&item.assigned_user)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(item)
    }

    /// Takes a staged line off an open invoice and routes its unit back.
    ///
    /// The reverse of [`add_item`](Self::add_item): the staged row is
    /// deleted and the unit returns to wherever its recorded origin says it
    /// came from (bucket credit / display slot / box re-write), one
    /// transaction. Totals are recomputed from the surviving lines, so
    /// removing an already-sold line takes its contribution back out.
    ///
    /// When the source row no longer exists the invoice side still commits
    /// and the outcome is `SourceMissing`, exactly as in post-close returns.
    ///
    /// ## Errors
    /// * `InvoiceNotOpen` - removal is a staging operation; closed invoices
    ///   take returns instead
    /// * `ItemNotFound` - no staged line with that barcode
    pub async fn remove_item(
        &self,
        invoice_id: &str,
        barcode: &str,
    ) -> DbResult<(Invoice, ReturnOutcome)> {
        debug!(invoice_id = %invoice_id, barcode = %barcode, "Removing staged item");

        let mut tx = self.pool.begin().await?;

        let mut invoice = load_invoice(&mut tx, invoice_id).await?;
        ensure_open(&invoice)?;

        let row = sqlx::query_as::<_, StagedItemRow>(
            r#"
            SELECT id, invoice_id, company_id, product_id, brand, reference, color,
                   size, barcode, sale_price_cents, base_price_cents, sold, sold_at,
                   added_at, quantity, origin_kind, warehouse_id, exhibition_store_id,
                   assigned_user
            FROM staged_items
            WHERE invoice_id = ?1 AND barcode = ?2
            "#,
        )
        .bind(invoice_id)
        .bind(barcode)
        .fetch_optional(&mut *tx)
        .await?;

        let item = row
            .ok_or_else(|| CoreError::ItemNotFound {
                invoice_id: invoice_id.to_string(),
                item: barcode.to_string(),
            })?
            .into_item()?;

        sqlx::query("DELETE FROM staged_items WHERE id = ?1")
            .bind(&item.id)
            .execute(&mut *tx)
            .await?;

        let now = Utc::now();
        let staged = staged_rows(&mut tx, invoice_id).await?;
        let totals = recompute_totals(&staged);
        write_totals(&mut tx, invoice_id, totals, now).await?;

        let restored = match &item.origin {
            UnitOrigin::Warehouse { size, .. } => {
                ledger::restore_to_warehouse(
                    &mut tx,
                    &invoice.company_id,
                    barcode,
                    UnitState::Staged,
                    &item.product_id,
                    size,
                )
                .await?
            }
            UnitOrigin::Exhibition { store_id, .. } => {
                ledger::restore_to_exhibition(
                    &mut tx,
                    &invoice.company_id,
                    barcode,
                    UnitState::Staged,
                    &item.product_id,
                    store_id,
                )
                .await?
            }
            UnitOrigin::Box { .. } => {
                ledger::restore_box(&mut tx, &invoice.company_id, barcode, item.quantity).await?
            }
        };

        tx.commit().await?;

        let outcome = if restored {
            debug!(invoice_id = %invoice_id, barcode = %barcode, "Staged item returned to source");
            ReturnOutcome::Restored
        } else {
            warn!(
                invoice_id = %invoice_id,
                barcode = %barcode,
                "Removal source no longer exists; staged line deleted only"
            );
            ReturnOutcome::SourceMissing
        };

        invoice.total_sold_cents = totals.total_sold_cents;
        invoice.total_earn_cents = totals.total_earn_cents;
        invoice.updated_at = now;
        Ok((invoice, outcome))
    }

    /// Marks a staged line sold at its final price and recomputes totals.
    ///
    /// The price overwrites the staged list-price snapshot (haggling
    /// happens). Totals are recomputed from the full staged list, so
    /// re-pricing an already-sold line cannot drift them.
    pub async fn mark_sold(
        &self,
        invoice_id: &str,
        item_id: &str,
        sale_price_cents: i64,
    ) -> DbResult<Invoice> {
        validate_price_cents("sale_price", sale_price_cents).map_err(CoreError::from)?;

        let mut tx = self.pool.begin().await?;

        let mut invoice = load_invoice(&mut tx, invoice_id).await?;
        ensure_open(&invoice)?;

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE staged_items SET sold = 1, sale_price_cents = ?3, sold_at = ?4
            WHERE id = ?1 AND invoice_id = ?2
            "#,
        )
        .bind(item_id)
        .bind(invoice_id)
        .bind(sale_price_cents)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::ItemNotFound {
                invoice_id: invoice_id.to_string(),
                item: item_id.to_string(),
            }
            .into());
        }

        let staged = staged_rows(&mut tx, invoice_id).await?;
        let totals = recompute_totals(&staged);
        write_totals(&mut tx, invoice_id, totals, now).await?;

        tx.commit().await?;

        debug!(
            invoice_id = %invoice_id,
            item_id = %item_id,
            sale_price_cents,
            total_sold_cents = totals.total_sold_cents,
            "Marked item sold"
        );

        invoice.total_sold_cents = totals.total_sold_cents;
        invoice.total_earn_cents = totals.total_earn_cents;
        invoice.updated_at = now;
        Ok(invoice)
    }

    // -------------------------------------------------------------------------
    // Close
    // -------------------------------------------------------------------------

    /// Closes an invoice: assigns its number, embeds the staged lines, and
    /// transitions the units to sold. Terminal.
    ///
    /// ## Preconditions
    /// * invoice open (`InvoiceNotOpen`)
    /// * at least one staged line (`EmptyInvoice`)
    /// * every line marked sold (`UnsoldItems`)
    pub async fn close_invoice(&self, invoice_id: &str) -> DbResult<Invoice> {
        let mut tx = self.pool.begin().await?;

        let mut invoice = load_invoice(&mut tx, invoice_id).await?;
        ensure_open(&invoice)?;

        let staged = staged_rows(&mut tx, invoice_id).await?;
        if staged.is_empty() {
            return Err(CoreError::EmptyInvoice(invoice_id.to_string()).into());
        }

        let unsold = staged.iter().filter(|item| !item.sold).count();
        if unsold > 0 {
            return Err(CoreError::UnsoldItems {
                invoice_id: invoice_id.to_string(),
                unsold,
            }
            .into());
        }

        // Derive the store letter and claim the store's next sequence value
        let store_ids: Vec<String> =
            sqlx::query_scalar("SELECT id FROM stores WHERE company_id = ?1")
                .bind(&invoice.company_id)
                .fetch_all(&mut *tx)
                .await?;
        let letter = tread_core::barcode::store_letter(&store_ids, &invoice.store_id)?;

        let sequence = counter::next_value(
            &mut tx,
            &invoice.company_id,
            &counter::invoice_scope(&invoice.store_id),
        )
        .await?;

        let now = Utc::now();
        let number = invoice_number(now.date_naive(), letter, sequence);
        let totals = recompute_totals(&staged);

        for item in &staged {
            sqlx::query(
                r#"
                INSERT INTO invoice_items (
                    id, invoice_id, company_id, product_id, brand, reference, color,
                    size, barcode, sale_price_cents, base_price_cents, earn_cents,
                    quantity, origin_kind, warehouse_id, exhibition_store_id,
                    returned, returned_at, added_at, assigned_user
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, 0, NULL, ?17, ?18)
                "#,
            )
            .bind(&item.id)
            .bind(&item.invoice_id)
            .bind(&item.company_id)
            .bind(&item.product_id)
            .bind(&item.brand)
            .bind(&item.reference)
            .bind(&item.color)
            .bind(&item.size)
            .bind(&item.barcode)
            .bind(item.sale_price_cents)
            .bind(item.base_price_cents)
            .bind(item.line_earn().cents())
            .bind(item.quantity)
            .bind(item.origin.kind())
            .bind(item.origin.warehouse_id())
            .bind(item.origin.exhibition_store_id())
            .bind(item.added_at)
            .bind(&item.assigned_user)
            .execute(&mut *tx)
            .await?;

            // box lines have no unit row to transition
            if item.origin.kind() != OriginKind::Box {
                ledger::transition_unit(
                    &mut tx,
                    &invoice.company_id,
                    &item.barcode,
                    UnitState::Staged,
                    UnitState::Sold,
                    None,
                )
                .await?;
            }
        }

        sqlx::query("DELETE FROM staged_items WHERE invoice_id = ?1")
            .bind(invoice_id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query(
            r#"
            UPDATE invoices
            SET invoice_number = ?2, status = 'closed',
                total_sold_cents = ?3, total_earn_cents = ?4,
                closed_at = ?5, updated_at = ?5
            WHERE id = ?1 AND status = 'open'
            "#,
        )
        .bind(invoice_id)
        .bind(&number)
        .bind(totals.total_sold_cents)
        .bind(totals.total_earn_cents)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::conflict(format!(
                "invoice {invoice_id} was closed by another transaction"
            )));
        }

        tx.commit().await?;

        info!(
            invoice_id = %invoice_id,
            number = %number,
            items = staged.len(),
            total_sold_cents = totals.total_sold_cents,
            total_earn_cents = totals.total_earn_cents,
            "Invoice closed"
        );

        invoice.invoice_number = Some(number);
        invoice.status = InvoiceStatus::Closed;
        invoice.total_sold_cents = totals.total_sold_cents;
        invoice.total_earn_cents = totals.total_earn_cents;
        invoice.closed_at = Some(now);
        invoice.updated_at = now;
        Ok(invoice)
    }

    // -------------------------------------------------------------------------
    // Post-close Returns
    // -------------------------------------------------------------------------

    /// Returns one embedded line of a closed invoice.
    ///
    /// The line is flagged returned and its contributions subtracted from
    /// the invoice totals; the unit routes back to wherever its recorded
    /// origin says it came from. When that source row no longer exists the
    /// invoice side still commits and the outcome is `SourceMissing`.
    ///
    /// ## Errors
    /// * `InvoiceNotClosed` - returns only apply after close
    /// * `ItemNotFound` / `AlreadyReturned`
    /// * `MissingReturnContext` - legacy line without origin columns;
    ///   rejected before any write
    pub async fn return_item(
        &self,
        invoice_id: &str,
        barcode: &str,
    ) -> DbResult<(Invoice, ReturnOutcome)> {
        let mut tx = self.pool.begin().await?;

        let mut invoice = load_invoice(&mut tx, invoice_id).await?;
        if invoice.status != InvoiceStatus::Closed {
            return Err(CoreError::InvoiceNotClosed {
                invoice_id: invoice_id.to_string(),
                status: invoice.status.to_string(),
            }
            .into());
        }

        let row = sqlx::query_as::<_, InvoiceItemRow>(
            r#"
            SELECT id, invoice_id, company_id, product_id, brand, reference, color,
                   size, barcode, sale_price_cents, base_price_cents, earn_cents,
                   quantity, origin_kind, warehouse_id, exhibition_store_id,
                   returned, returned_at, added_at, assigned_user
            FROM invoice_items
            WHERE invoice_id = ?1 AND barcode = ?2
            "#,
        )
        .bind(invoice_id)
        .bind(barcode)
        .fetch_optional(&mut *tx)
        .await?;

        let item = row
            .ok_or_else(|| CoreError::ItemNotFound {
                invoice_id: invoice_id.to_string(),
                item: barcode.to_string(),
            })?
            .into_item();

        if item.returned {
            return Err(CoreError::AlreadyReturned {
                barcode: barcode.to_string(),
            }
            .into());
        }

        // Hard precondition, checked before any write: without its origin
        // there is nowhere to route the unit back to.
        let origin = item.origin.clone().ok_or_else(|| CoreError::MissingReturnContext {
            barcode: barcode.to_string(),
        })?;

        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE invoice_items SET returned = 1, returned_at = ?2 WHERE id = ?1 AND returned = 0",
        )
        .bind(&item.id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::conflict(format!(
                "item {barcode} was returned by another transaction"
            )));
        }

        let totals = reverse_item(
            InvoiceTotals::new(invoice.total_sold_cents, invoice.total_earn_cents),
            &item,
        );
        write_totals(&mut tx, invoice_id, totals, now).await?;

        let restored = match &origin {
            UnitOrigin::Warehouse { size, .. } => {
                ledger::restore_to_warehouse(
                    &mut tx,
                    &invoice.company_id,
                    barcode,
                    UnitState::Sold,
                    &item.product_id,
                    size,
                )
                .await?
            }
            UnitOrigin::Exhibition { store_id, .. } => {
                ledger::restore_to_exhibition(
                    &mut tx,
                    &invoice.company_id,
                    barcode,
                    UnitState::Sold,
                    &item.product_id,
                    store_id,
                )
                .await?
            }
            UnitOrigin::Box { .. } => {
                ledger::restore_box(&mut tx, &invoice.company_id, barcode, item.quantity).await?
            }
        };

        tx.commit().await?;

        let outcome = if restored {
            debug!(invoice_id = %invoice_id, barcode = %barcode, "Item returned to source");
            ReturnOutcome::Restored
        } else {
            warn!(
                invoice_id = %invoice_id,
                barcode = %barcode,
                "Return source no longer exists; invoice side reversed only"
            );
            ReturnOutcome::SourceMissing
        };

        invoice.total_sold_cents = totals.total_sold_cents;
        invoice.total_earn_cents = totals.total_earn_cents;
        invoice.updated_at = now;
        Ok((invoice, outcome))
    }
}

// =============================================================================
// Shared Helpers
// =============================================================================

async fn load_invoice(conn: &mut SqliteConnection, id: &str) -> DbResult<Invoice> {
    let invoice = sqlx::query_as::<_, Invoice>(
        r#"
        SELECT id, company_id, store_id, invoice_number, status,
               total_sold_cents, total_earn_cents, assigned_user,
               created_at, updated_at, closed_at
        FROM invoices
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    invoice.ok_or_else(|| CoreError::InvoiceNotFound(id.to_string()).into())
}

fn ensure_open(invoice: &Invoice) -> DbResult<()> {
    if !invoice.is_open() {
        return Err(CoreError::InvoiceNotOpen {
            invoice_id: invoice.id.clone(),
            status: invoice.status.to_string(),
        }
        .into());
    }
    Ok(())
}

async fn staged_rows(conn: &mut SqliteConnection, invoice_id: &str) -> DbResult<Vec<StagedItem>> {
    let rows = sqlx::query_as::<_, StagedItemRow>(
        r#"
        SELECT id, invoice_id, company_id, product_id, brand, reference, color,
               size, barcode, sale_price_cents, base_price_cents, sold, sold_at,
               added_at, quantity, origin_kind, warehouse_id, exhibition_store_id,
               assigned_user
        FROM staged_items
        WHERE invoice_id = ?1
        ORDER BY added_at
        "#,
    )
    .bind(invoice_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(StagedItemRow::into_item).collect()
}

async fn write_totals(
    conn: &mut SqliteConnection,
    invoice_id: &str,
    totals: InvoiceTotals,
    now: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE invoices
        SET total_sold_cents = ?2, total_earn_cents = ?3, updated_at = ?4
        WHERE id = ?1
        "#,
    )
    .bind(invoice_id)
    .bind(totals.total_sold_cents)
    .bind(totals.total_earn_cents)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
