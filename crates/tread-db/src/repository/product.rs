//! # Product Repository
//!
//! Stock intake: products with size buckets, individual units, sealed boxes.
//!
//! ## Intake Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Product Intake                                   │
//! │                                                                         │
//! │  create_product(NewProduct { sizes: {"38": 2, "40": 1}, .. })           │
//! │       │                                                                 │
//! │       ▼  one transaction                                                │
//! │  1. validate everything (nothing written, no counter burned)            │
//! │  2. INSERT product row (total_units = 0, no run yet)                    │
//! │  3. stamp units: claim box numbers from the per-company counter,        │
//! │     walk positions 01..99, roll to a fresh box past 99                  │
//! │       38 → 260815000001 01, 260815000001 02                             │
//! │       40 → 260815000001 03                                              │
//! │  4. upsert size_buckets, bump total_units, persist the run              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Product { total_units: 3, box_number: 1, box_position: 3, .. }         │
//! │                                                                         │
//! │  add_stock later RESUMES the run at position 04 - the sequence          │
//! │  never restarts, so barcodes never collide.                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Sealed boxes are separate documents: they carry their own descriptive
//! snapshot and quantity, get an 18-char barcode with the all-zero tail, and
//! never touch any product's buckets.

use std::collections::BTreeMap;

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::counter;
use crate::repository::ledger;
use tread_core::barcode::{box_barcode, unit_barcode, BarcodeRun};
use tread_core::validation::{
    validate_new_box, validate_new_product, validate_quantity, validate_size,
};
use tread_core::{BoxUnit, CoreError, ExhibitionSlot, NewBox, NewProduct, Product, SizeBucket};

/// Repository for product and box database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Products
    // -------------------------------------------------------------------------

    /// Creates a product and stamps its initial stock.
    ///
    /// ## What This Does (one transaction)
    /// 1. Validates the whole intake; a bad field burns no sequence values
    /// 2. Inserts the product row
    /// 3. Generates a barcode per unit (box runs from the company counter)
    /// 4. Writes unit rows, size buckets, `total_units`, and the run
    ///
    /// ## Returns
    /// The assembled product, buckets and barcodes included.
    pub async fn create_product(&self, input: NewProduct) -> DbResult<Product> {
        validate_new_product(&input).map_err(CoreError::from)?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        debug!(
            id = %id,
            brand = %input.brand,
            reference = %input.reference,
            sizes = input.sizes.len(),
            "Creating product"
        );

        let mut tx = self.pool.begin().await?;

        check_warehouse(&mut tx, &input.company_id, &input.warehouse_id).await?;

        sqlx::query(
            r#"
            INSERT INTO products (
                id, company_id, warehouse_id,
                brand, reference, color,
                sale_price_cents, base_price_cents,
                total_units, box_number, box_position,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, NULL, NULL, ?9, ?9)
            "#,
        )
        .bind(&id)
        .bind(&input.company_id)
        .bind(&input.warehouse_id)
        .bind(input.brand.trim())
        .bind(input.reference.trim())
        .bind(input.color.trim())
        .bind(input.sale_price_cents)
        .bind(input.base_price_cents)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let (run, stamped) =
            stamp_units(&mut tx, &input.company_id, &id, None, &input.sizes).await?;

        sqlx::query(
            r#"
            UPDATE products
            SET total_units = total_units + ?2,
                box_number = ?3,
                box_position = ?4,
                updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(&id)
        .bind(stamped)
        .bind(run.box_number)
        .bind(run.position)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.get_by_id(&id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", &id))
    }

    /// Gets a product by ID, with buckets and exhibition views assembled.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, company_id, warehouse_id, brand, reference, color,
                   sale_price_cents, base_price_cents, total_units,
                   box_number, box_position, created_at, updated_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match product {
            Some(product) => Ok(Some(self.assemble(product).await?)),
            None => Ok(None),
        }
    }

    /// Lists a company's products, assembled.
    pub async fn list_for_company(&self, company_id: &str) -> DbResult<Vec<Product>> {
        let rows = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, company_id, warehouse_id, brand, reference, color,
                   sale_price_cents, base_price_cents, total_units,
                   box_number, box_position, created_at, updated_at
            FROM products
            WHERE company_id = ?1
            ORDER BY brand, reference, color
            "#,
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;

        let mut products = Vec::with_capacity(rows.len());
        for row in rows {
            products.push(self.assemble(row).await?);
        }

        Ok(products)
    }

    /// Adds units to an existing size bucket, continuing the barcode run.
    ///
    /// The new barcodes pick up after the highest position the product has
    /// ever stamped; the sequence never restarts.
    pub async fn add_stock(&self, product_id: &str, size: &str, quantity: i64) -> DbResult<Product> {
        validate_size(size).map_err(CoreError::from)?;
        validate_quantity(quantity).map_err(CoreError::from)?;

        debug!(product_id = %product_id, size = %size, quantity, "Adding stock");

        let mut tx = self.pool.begin().await?;

        let row: Option<(String, Option<i64>, Option<i64>)> = sqlx::query_as(
            "SELECT company_id, box_number, box_position FROM products WHERE id = ?1",
        )
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?;

        let (company_id, box_number, box_position) =
            row.ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;

        let run = match (box_number, box_position) {
            (Some(number), Some(position)) => Some(BarcodeRun::resume(number, position)),
            _ => None,
        };

        let mut sizes = BTreeMap::new();
        sizes.insert(size.trim().to_string(), quantity);

        let (run, stamped) = stamp_units(&mut tx, &company_id, product_id, run, &sizes).await?;

        sqlx::query(
            r#"
            UPDATE products
            SET total_units = total_units + ?2,
                box_number = ?3,
                box_position = ?4,
                updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(product_id)
        .bind(stamped)
        .bind(run.box_number)
        .bind(run.position)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.get_by_id(product_id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", product_id))
    }

    /// Deletes one warehouse unit by barcode (manual stock correction).
    ///
    /// Only `warehouse`-state units qualify; exhibited, staged, or sold
    /// units are somewhere an operator must recall them from first.
    pub async fn remove_unit(&self, company_id: &str, barcode: &str) -> DbResult<()> {
        debug!(barcode = %barcode, "Removing warehouse unit");

        let mut tx = self.pool.begin().await?;

        let removed: Option<(String, String)> = sqlx::query_as(
            r#"
            DELETE FROM stock_units
            WHERE barcode = ?1 AND company_id = ?2 AND state = 'warehouse'
            RETURNING product_id, size
            "#,
        )
        .bind(barcode)
        .bind(company_id)
        .fetch_optional(&mut *tx)
        .await?;

        let (product_id, size) = removed.ok_or_else(|| CoreError::UnitNotFound {
            barcode: barcode.to_string(),
        })?;

        ledger::debit_bucket(&mut tx, &product_id, &size).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Deletes a product. Unit rows and buckets cascade with it; snapshot
    /// lines on invoices survive (and return as `SourceMissing`).
    pub async fn delete_product(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Sealed Boxes
    // -------------------------------------------------------------------------

    /// Creates a sealed box with a freshly allocated box barcode.
    pub async fn create_box(&self, input: NewBox) -> DbResult<BoxUnit> {
        validate_new_box(&input).map_err(CoreError::from)?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        check_warehouse(&mut tx, &input.company_id, &input.warehouse_id).await?;

        let box_number = counter::next_value(&mut tx, &input.company_id, counter::BOX_SCOPE).await?;

        let unit = BoxUnit {
            id: Uuid::new_v4().to_string(),
            company_id: input.company_id,
            warehouse_id: input.warehouse_id,
            brand: input.brand.trim().to_string(),
            reference: input.reference.trim().to_string(),
            color: input.color.trim().to_string(),
            sale_price_cents: input.sale_price_cents,
            base_price_cents: input.base_price_cents,
            barcode: box_barcode(now.date_naive(), box_number),
            quantity: input.quantity,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %unit.id, barcode = %unit.barcode, quantity = unit.quantity, "Creating box");

        sqlx::query(
            r#"
            INSERT INTO boxes (
                id, company_id, warehouse_id,
                brand, reference, color,
                sale_price_cents, base_price_cents,
                barcode, quantity, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&unit.id)
        .bind(&unit.company_id)
        .bind(&unit.warehouse_id)
        .bind(&unit.brand)
        .bind(&unit.reference)
        .bind(&unit.color)
        .bind(unit.sale_price_cents)
        .bind(unit.base_price_cents)
        .bind(&unit.barcode)
        .bind(unit.quantity)
        .bind(unit.created_at)
        .bind(unit.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(unit)
    }

    /// Gets a box by its barcode.
    pub async fn get_box_by_barcode(
        &self,
        company_id: &str,
        barcode: &str,
    ) -> DbResult<Option<BoxUnit>> {
        let unit = sqlx::query_as::<_, BoxUnit>(
            r#"
            SELECT id, company_id, warehouse_id, brand, reference, color,
                   sale_price_cents, base_price_cents, barcode, quantity,
                   created_at, updated_at
            FROM boxes
            WHERE company_id = ?1 AND barcode = ?2
            "#,
        )
        .bind(company_id)
        .bind(barcode)
        .fetch_optional(&self.pool)
        .await?;

        Ok(unit)
    }

    /// Lists a company's boxes, consumed ones included.
    pub async fn list_boxes(&self, company_id: &str) -> DbResult<Vec<BoxUnit>> {
        let boxes = sqlx::query_as::<_, BoxUnit>(
            r#"
            SELECT id, company_id, warehouse_id, brand, reference, color,
                   sale_price_cents, base_price_cents, barcode, quantity,
                   created_at, updated_at
            FROM boxes
            WHERE company_id = ?1
            ORDER BY created_at
            "#,
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(boxes)
    }

    /// Deletes a box document.
    pub async fn delete_box(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM boxes WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Box", id));
        }

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Assembly
    // -------------------------------------------------------------------------

    /// Fills a product row's `sizes` and `exhibition` views from unit rows.
    async fn assemble(&self, mut product: Product) -> DbResult<Product> {
        let buckets: Vec<(String, i64)> = sqlx::query_as(
            "SELECT size, quantity FROM size_buckets WHERE product_id = ?1 ORDER BY size",
        )
        .bind(&product.id)
        .fetch_all(&self.pool)
        .await?;

        let barcodes: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT size, barcode FROM stock_units
            WHERE product_id = ?1 AND state = 'warehouse'
            ORDER BY barcode
            "#,
        )
        .bind(&product.id)
        .fetch_all(&self.pool)
        .await?;

        let mut sizes: BTreeMap<String, SizeBucket> = buckets
            .into_iter()
            .map(|(size, quantity)| {
                (
                    size,
                    SizeBucket {
                        quantity,
                        barcodes: Vec::new(),
                    },
                )
            })
            .collect();

        for (size, barcode) in barcodes {
            if let Some(bucket) = sizes.get_mut(&size) {
                bucket.barcodes.push(barcode);
            }
        }

        let slots: Vec<(String, String, String)> = sqlx::query_as(
            r#"
            SELECT store_id, size, barcode FROM stock_units
            WHERE product_id = ?1 AND state = 'exhibition'
            "#,
        )
        .bind(&product.id)
        .fetch_all(&self.pool)
        .await?;

        product.exhibition = slots
            .into_iter()
            .map(|(store_id, size, barcode)| (store_id, ExhibitionSlot { size, barcode }))
            .collect();
        product.sizes = sizes;

        Ok(product)
    }
}

// =============================================================================
// Intake Helpers
// =============================================================================

/// Verifies the warehouse exists and belongs to the company.
async fn check_warehouse(
    conn: &mut SqliteConnection,
    company_id: &str,
    warehouse_id: &str,
) -> DbResult<()> {
    let owner: Option<String> =
        sqlx::query_scalar("SELECT company_id FROM warehouses WHERE id = ?1")
            .bind(warehouse_id)
            .fetch_optional(&mut *conn)
            .await?;

    match owner {
        None => Err(DbError::not_found("Warehouse", warehouse_id)),
        Some(owner) if owner != company_id => Err(DbError::ForeignKeyViolation {
            message: format!("warehouse {warehouse_id} belongs to another company"),
        }),
        Some(_) => Ok(()),
    }
}

/// Stamps one barcode per unit and writes unit rows and bucket upserts.
///
/// ## Run Continuation
/// `run` is the product's persisted (box, last position) pair, or `None`
/// for a product that has never stamped a unit. Past position 99 a fresh
/// box number is claimed from the company counter and the run restarts
/// at 01; position 100 never exists.
///
/// ## Returns
/// The final run (for the caller to persist) and the number of units
/// stamped (the caller's `total_units` delta).
async fn stamp_units(
    conn: &mut SqliteConnection,
    company_id: &str,
    product_id: &str,
    run: Option<BarcodeRun>,
    sizes: &BTreeMap<String, i64>,
) -> DbResult<(BarcodeRun, i64)> {
    let today = Utc::now().date_naive();
    let now = Utc::now();

    let mut run = match run {
        Some(run) => run,
        None => BarcodeRun::new(counter::next_value(&mut *conn, company_id, counter::BOX_SCOPE).await?),
    };

    let mut stamped = 0i64;

    for (size, count) in sizes {
        let size = size.trim();

        for _ in 0..*count {
            let position = match run.next_position() {
                Some(position) => position,
                None => {
                    let box_number =
                        counter::next_value(&mut *conn, company_id, counter::BOX_SCOPE).await?;
                    run = BarcodeRun::new(box_number);
                    run.next_position().ok_or_else(|| {
                        DbError::Internal("fresh barcode run is already exhausted".to_string())
                    })?
                }
            };

            let barcode = unit_barcode(today, run.box_number, position);

            sqlx::query(
                r#"
                INSERT INTO stock_units (barcode, company_id, product_id, size, state, store_id, created_at)
                VALUES (?1, ?2, ?3, ?4, 'warehouse', NULL, ?5)
                "#,
            )
            .bind(&barcode)
            .bind(company_id)
            .bind(product_id)
            .bind(size)
            .bind(now)
            .execute(&mut *conn)
            .await?;

            stamped += 1;
        }

        sqlx::query(
            r#"
            INSERT INTO size_buckets (product_id, size, quantity)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(product_id, size) DO UPDATE SET quantity = quantity + excluded.quantity
            "#,
        )
        .bind(product_id)
        .bind(size)
        .bind(count)
        .execute(&mut *conn)
        .await?;
    }

    Ok((run, stamped))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashSet};

    use tread_core::barcode::{parse_barcode, BarcodeKind};
    use tread_core::{CoreError, NewProduct};

    use crate::error::DbError;
    use crate::repository::testing::{fixture, Fixture};

    /// total_units == Σ bucket quantities, every bucket quantity matches its
    /// barcode list, and no zero-quantity bucket row survives.
    async fn assert_stock_invariants(fx: &Fixture, product_id: &str) {
        let product = fx
            .db
            .products()
            .get_by_id(product_id)
            .await
            .unwrap()
            .unwrap();

        let bucket_sum: i64 = product.sizes.values().map(|b| b.quantity).sum();
        assert_eq!(product.total_units, bucket_sum);

        for (size, bucket) in &product.sizes {
            assert_eq!(
                bucket.quantity,
                bucket.barcodes.len() as i64,
                "bucket {size} quantity != barcode count"
            );
            assert!(bucket.quantity > 0, "bucket {size} kept at zero");
        }

        let zero_rows: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM size_buckets WHERE product_id = ?1 AND quantity = 0",
        )
        .bind(product_id)
        .fetch_one(fx.db.pool())
        .await
        .unwrap();
        assert_eq!(zero_rows, 0);
    }

    #[tokio::test]
    async fn test_create_product_stamps_stock() {
        let fx = fixture().await;
        let product = fx.product(&[("38", 2), ("40", 1)]).await;

        assert_eq!(product.total_units, 3);
        assert_eq!(product.sizes["38"].quantity, 2);
        assert_eq!(product.sizes["40"].quantity, 1);
        assert_eq!(product.box_number, Some(1));
        assert_eq!(product.box_position, Some(3));

        // All three barcodes are distinct unit barcodes from box run 1
        let mut seen = HashSet::new();
        for bucket in product.sizes.values() {
            for code in &bucket.barcodes {
                assert!(seen.insert(code.clone()), "duplicate barcode {code}");
                match parse_barcode(code) {
                    Some(BarcodeKind::Unit { box_number, .. }) => assert_eq!(box_number, 1),
                    other => panic!("expected unit barcode, got {other:?}"),
                }
            }
        }

        assert_stock_invariants(&fx, &product.id).await;
    }

    #[tokio::test]
    async fn test_run_rolls_to_fresh_box_past_99() {
        let fx = fixture().await;
        let product = fx.product(&[("42", 150)]).await;

        assert_eq!(product.total_units, 150);

        let mut by_box: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
        for code in &product.sizes["42"].barcodes {
            match parse_barcode(code) {
                Some(BarcodeKind::Unit {
                    box_number,
                    position,
                    ..
                }) => by_box.entry(box_number).or_default().push(position),
                other => panic!("expected unit barcode, got {other:?}"),
            }
        }

        // 150 units: positions 01-99 in box 1, then 01-51 in box 2
        assert_eq!(by_box.len(), 2);
        assert_eq!(by_box[&1].len(), 99);
        assert_eq!(by_box[&2].len(), 51);
        assert!(by_box.values().flatten().all(|p| (1..=99).contains(p)));

        assert_eq!(product.box_number, Some(2));
        assert_eq!(product.box_position, Some(51));
    }

    #[tokio::test]
    async fn test_add_stock_continues_the_run() {
        let fx = fixture().await;
        let product = fx.product(&[("40", 1)]).await;
        assert_eq!(product.box_position, Some(1));

        let product = fx
            .db
            .products()
            .add_stock(&product.id, "40", 2)
            .await
            .unwrap();

        assert_eq!(product.total_units, 3);
        assert_eq!(product.box_position, Some(3));

        let positions: Vec<i64> = product.sizes["40"]
            .barcodes
            .iter()
            .map(|code| match parse_barcode(code) {
                Some(BarcodeKind::Unit { position, .. }) => position,
                other => panic!("expected unit barcode, got {other:?}"),
            })
            .collect();
        assert_eq!(positions, vec![1, 2, 3]);

        assert_stock_invariants(&fx, &product.id).await;
    }

    #[tokio::test]
    async fn test_remove_unit_maintains_buckets() {
        let fx = fixture().await;
        let product = fx.product(&[("38", 1), ("40", 2)]).await;
        let lone = Fixture::first_barcode(&product, "38");

        fx.db
            .products()
            .remove_unit(&fx.company_id, &lone)
            .await
            .unwrap();

        let product = fx
            .db
            .products()
            .get_by_id(&product.id)
            .await
            .unwrap()
            .unwrap();

        // The emptied 38 bucket is gone entirely, not left at zero
        assert!(!product.sizes.contains_key("38"));
        assert_eq!(product.total_units, 2);
        assert_stock_invariants(&fx, &product.id).await;

        // Removing it again: nothing in warehouse state anymore
        let err = fx
            .db
            .products()
            .remove_unit(&fx.company_id, &lone)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::UnitNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_create_box_allocates_box_barcode() {
        let fx = fixture().await;
        let sealed = fx.sealed_box(6).await;

        assert_eq!(sealed.barcode.len(), 18);
        assert!(sealed.barcode.ends_with("000000"));
        assert_eq!(sealed.quantity, 6);
        assert!(!sealed.is_consumed());

        match parse_barcode(&sealed.barcode) {
            Some(BarcodeKind::Box { box_number, .. }) => assert_eq!(box_number, 1),
            other => panic!("expected box barcode, got {other:?}"),
        }

        // Boxes and unit runs share the company's number stream
        let product = fx.product(&[("40", 1)]).await;
        assert_eq!(product.box_number, Some(2));
    }

    #[tokio::test]
    async fn test_number_stream_spans_warehouses() {
        let fx = fixture().await;

        // Run 1 claimed by intake at the first warehouse
        let first = fx.product(&[("38", 1)]).await;
        assert_eq!(first.warehouse_id, fx.warehouse_id);
        assert_eq!(first.box_number, Some(1));

        // The overflow warehouse draws from the same company-wide stream,
        // so boxes stay physically unique across locations
        let mut sizes = BTreeMap::new();
        sizes.insert("43".to_string(), 2i64);
        let second = fx
            .db
            .products()
            .create_product(NewProduct {
                company_id: fx.company_id.clone(),
                warehouse_id: fx.warehouse2_id.clone(),
                brand: "Trek".to_string(),
                reference: "TK-2".to_string(),
                color: "black".to_string(),
                sale_price_cents: 110_000,
                base_price_cents: 70_000,
                sizes,
            })
            .await
            .unwrap();
        assert_eq!(second.warehouse_id, fx.warehouse2_id);
        assert_eq!(second.box_number, Some(2));

        for code in &second.sizes["43"].barcodes {
            match parse_barcode(code) {
                Some(BarcodeKind::Unit { box_number, .. }) => assert_eq!(box_number, 2),
                other => panic!("expected unit barcode, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_rejected_intake_burns_nothing() {
        let fx = fixture().await;

        let mut sizes = BTreeMap::new();
        sizes.insert("40".to_string(), 0i64);

        let err = fx
            .db
            .products()
            .create_product(NewProduct {
                company_id: fx.company_id.clone(),
                warehouse_id: fx.warehouse_id.clone(),
                brand: "Runner".to_string(),
                reference: "RX-9".to_string(),
                color: "white".to_string(),
                sale_price_cents: 100_000,
                base_price_cents: 60_000,
                sizes,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));

        // The failed intake claimed no box number: the next one starts at 1
        let product = fx.product(&[("40", 1)]).await;
        assert_eq!(product.box_number, Some(1));
    }

    #[tokio::test]
    async fn test_delete_product_cascades_stock() {
        let fx = fixture().await;
        let product = fx.product(&[("38", 2)]).await;

        fx.db.products().delete_product(&product.id).await.unwrap();
        assert!(fx.db.products().get_by_id(&product.id).await.unwrap().is_none());

        let units: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stock_units WHERE product_id = ?1")
            .bind(&product.id)
            .fetch_one(fx.db.pool())
            .await
            .unwrap();
        assert_eq!(units, 0);
    }
}
