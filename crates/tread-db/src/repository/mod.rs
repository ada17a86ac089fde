//! # Repository Module
//!
//! Database repository implementations for Tread.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern Explained                         │
//! │                                                                         │
//! │  The Repository pattern abstracts database access behind a clean API.  │
//! │                                                                         │
//! │  Caller                                                                 │
//! │       │                                                                 │
//! │       │  db.invoices().add_item(invoice_id, barcode)                   │
//! │       │  ↓                                                              │
//! │       ▼                                                                 │
//! │  InvoiceRepository                                                     │
//! │  ├── begins ONE transaction                                            │
//! │  ├── calls ledger helpers on that transaction                          │
//! │  └── commits or rolls back as a unit                                   │
//! │       │                                                                 │
//! │       │  SQL                                                            │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Benefits:                                                              │
//! │  • Every logical operation is one transaction                          │
//! │  • SQL is isolated in one place per aggregate                          │
//! │  • Conditional writes make unit consumption race-safe                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`company::CompanyRepository`] - Companies, warehouses, stores
//! - [`product::ProductRepository`] - Products, size buckets, boxes, intake
//! - [`ledger::LedgerRepository`] - Barcode lookup and exhibition moves
//! - [`invoice::InvoiceRepository`] - Staging, mark-sold, close, returns
//!
//! The `counter` module is internal: atomic sequence allocation used by the
//! intake and close paths.

pub mod company;
pub(crate) mod counter;
pub mod invoice;
pub mod ledger;
pub mod product;

// =============================================================================
// Shared Test Fixtures
// =============================================================================

#[cfg(test)]
pub(crate) mod testing {
    //! One seeded company for repository tests: two warehouses, two stores.
    //! Built through the public repository API so fixtures exercise the same
    //! code paths the application does.

    use std::collections::BTreeMap;

    use tread_core::{NewBox, NewProduct, Product};

    use crate::pool::{Database, DbConfig};

    pub struct Fixture {
        pub db: Database,
        pub company_id: String,
        pub warehouse_id: String,
        pub warehouse2_id: String,
        pub store_id: String,
        pub store2_id: String,
    }

    /// Fresh in-memory database with the standard fixture rows.
    pub async fn fixture() -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let companies = db.companies();
        let company = companies.create_company("Trotamundos Shoes").await.unwrap();
        let warehouse = companies
            .create_warehouse(&company.id, "Central Warehouse")
            .await
            .unwrap();
        let warehouse2 = companies
            .create_warehouse(&company.id, "Overflow Warehouse")
            .await
            .unwrap();
        let store = companies
            .create_store(&company.id, "Main Street")
            .await
            .unwrap();
        let store2 = companies
            .create_store(&company.id, "Harbor Mall")
            .await
            .unwrap();

        Fixture {
            db,
            company_id: company.id,
            warehouse_id: warehouse.id,
            warehouse2_id: warehouse2.id,
            store_id: store.id,
            store2_id: store2.id,
        }
    }

    impl Fixture {
        /// Creates a product with the given (size, quantity) buckets.
        pub async fn product(&self, sizes: &[(&str, i64)]) -> Product {
            let sizes: BTreeMap<String, i64> = sizes
                .iter()
                .map(|(s, q)| (s.to_string(), *q))
                .collect();

            self.db
                .products()
                .create_product(NewProduct {
                    company_id: self.company_id.clone(),
                    warehouse_id: self.warehouse_id.clone(),
                    brand: "Runner".to_string(),
                    reference: "RX-9".to_string(),
                    color: "white".to_string(),
                    sale_price_cents: 100_000,
                    base_price_cents: 60_000,
                    sizes,
                })
                .await
                .unwrap()
        }

        /// Creates a sealed box with the given unit count.
        pub async fn sealed_box(&self, quantity: i64) -> tread_core::BoxUnit {
            self.db
                .products()
                .create_box(NewBox {
                    company_id: self.company_id.clone(),
                    warehouse_id: self.warehouse_id.clone(),
                    brand: "Trail".to_string(),
                    reference: "TB-4".to_string(),
                    color: "brown".to_string(),
                    sale_price_cents: 90_000,
                    base_price_cents: 50_000,
                    quantity,
                })
                .await
                .unwrap()
        }

        /// The first warehouse barcode of the given product/size bucket.
        pub fn first_barcode(product: &Product, size: &str) -> String {
            product.sizes[size].barcodes[0].clone()
        }
    }
}
