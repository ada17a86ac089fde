//! # Company Repository
//!
//! Tenancy operations: companies and the warehouses and stores they own.
//!
//! ## Ownership Tree
//! ```text
//! Company
//! ├── Warehouse*   (stock lives here: products, buckets, boxes)
//! └── Store*       (invoices issue here; exhibition slots hang off stores)
//! ```
//!
//! Store invoice-number letters are derived, never stored: a store's letter
//! is its position among the company's store ids sorted ascending. See
//! [`CompanyRepository::store_letter`].

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tread_core::validation::validate_label;
use tread_core::{barcode, Company, CoreError, Store, Warehouse};

/// Repository for tenancy database operations.
#[derive(Debug, Clone)]
pub struct CompanyRepository {
    pool: SqlitePool,
}

impl CompanyRepository {
    /// Creates a new CompanyRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CompanyRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Companies
    // -------------------------------------------------------------------------

    /// Creates a company.
    pub async fn create_company(&self, name: &str) -> DbResult<Company> {
        validate_label("name", name).map_err(CoreError::from)?;

        let company = Company {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            created_at: Utc::now(),
        };

        debug!(id = %company.id, name = %company.name, "Creating company");

        sqlx::query("INSERT INTO companies (id, name, created_at) VALUES (?1, ?2, ?3)")
            .bind(&company.id)
            .bind(&company.name)
            .bind(company.created_at)
            .execute(&self.pool)
            .await?;

        Ok(company)
    }

    /// Gets a company by ID.
    pub async fn get_company(&self, id: &str) -> DbResult<Option<Company>> {
        let company = sqlx::query_as::<_, Company>(
            "SELECT id, name, created_at FROM companies WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(company)
    }

    /// Lists all companies.
    pub async fn list_companies(&self) -> DbResult<Vec<Company>> {
        let companies = sqlx::query_as::<_, Company>(
            "SELECT id, name, created_at FROM companies ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(companies)
    }

    // -------------------------------------------------------------------------
    // Warehouses
    // -------------------------------------------------------------------------

    /// Creates a warehouse belonging to a company.
    pub async fn create_warehouse(&self, company_id: &str, name: &str) -> DbResult<Warehouse> {
        validate_label("name", name).map_err(CoreError::from)?;

        let warehouse = Warehouse {
            id: Uuid::new_v4().to_string(),
            company_id: company_id.to_string(),
            name: name.trim().to_string(),
            created_at: Utc::now(),
        };

        debug!(id = %warehouse.id, company_id = %company_id, "Creating warehouse");

        sqlx::query(
            "INSERT INTO warehouses (id, company_id, name, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&warehouse.id)
        .bind(&warehouse.company_id)
        .bind(&warehouse.name)
        .bind(warehouse.created_at)
        .execute(&self.pool)
        .await?;

        Ok(warehouse)
    }

    /// Gets a warehouse by ID.
    pub async fn get_warehouse(&self, id: &str) -> DbResult<Option<Warehouse>> {
        let warehouse = sqlx::query_as::<_, Warehouse>(
            "SELECT id, company_id, name, created_at FROM warehouses WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(warehouse)
    }

    /// Lists a company's warehouses.
    pub async fn list_warehouses(&self, company_id: &str) -> DbResult<Vec<Warehouse>> {
        let warehouses = sqlx::query_as::<_, Warehouse>(
            "SELECT id, company_id, name, created_at FROM warehouses WHERE company_id = ?1 ORDER BY name",
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(warehouses)
    }

    // -------------------------------------------------------------------------
    // Stores
    // -------------------------------------------------------------------------

    /// Creates a store belonging to a company.
    pub async fn create_store(&self, company_id: &str, name: &str) -> DbResult<Store> {
        validate_label("name", name).map_err(CoreError::from)?;

        let store = Store {
            id: Uuid::new_v4().to_string(),
            company_id: company_id.to_string(),
            name: name.trim().to_string(),
            created_at: Utc::now(),
        };

        debug!(id = %store.id, company_id = %company_id, "Creating store");

        sqlx::query(
            "INSERT INTO stores (id, company_id, name, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&store.id)
        .bind(&store.company_id)
        .bind(&store.name)
        .bind(store.created_at)
        .execute(&self.pool)
        .await?;

        Ok(store)
    }

    /// Gets a store by ID.
    pub async fn get_store(&self, id: &str) -> DbResult<Option<Store>> {
        let store = sqlx::query_as::<_, Store>(
            "SELECT id, company_id, name, created_at FROM stores WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(store)
    }

    /// Lists a company's stores.
    pub async fn list_stores(&self, company_id: &str) -> DbResult<Vec<Store>> {
        let stores = sqlx::query_as::<_, Store>(
            "SELECT id, company_id, name, created_at FROM stores WHERE company_id = ?1 ORDER BY name",
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(stores)
    }

    /// Derives a store's invoice-number letter.
    ///
    /// ## Returns
    /// * `Ok('A'..='Z')` - position among the company's store ids, sorted
    /// * `Err(StoreNotFound)` - the id doesn't exist
    /// * `Err(StoreLetterExhausted)` - the store sorts past 'Z'
    pub async fn store_letter(&self, store_id: &str) -> DbResult<char> {
        let store = self
            .get_store(store_id)
            .await?
            .ok_or_else(|| CoreError::StoreNotFound(store_id.to_string()))?;

        let ids: Vec<String> =
            sqlx::query_scalar("SELECT id FROM stores WHERE company_id = ?1")
                .bind(&store.company_id)
                .fetch_all(&self.pool)
                .await?;

        let letter = barcode::store_letter(&ids, store_id)?;
        Ok(letter)
    }

    /// Deletes a company and everything it owns (cascades).
    pub async fn delete_company(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM companies WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Company", id));
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::repository::testing::fixture;
    use tread_core::CoreError;

    use crate::error::DbError;

    #[tokio::test]
    async fn test_fixture_rows_exist() {
        let fx = fixture().await;
        let companies = fx.db.companies();

        let company = companies.get_company(&fx.company_id).await.unwrap().unwrap();
        assert_eq!(company.name, "Trotamundos Shoes");

        assert_eq!(companies.list_warehouses(&fx.company_id).await.unwrap().len(), 2);
        assert_eq!(companies.list_stores(&fx.company_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_store_letters_follow_sorted_ids() {
        let fx = fixture().await;
        let companies = fx.db.companies();

        let a = companies.store_letter(&fx.store_id).await.unwrap();
        let b = companies.store_letter(&fx.store2_id).await.unwrap();

        // Two stores: one is 'A', the other 'B', ordered by id
        assert_ne!(a, b);
        if fx.store_id < fx.store2_id {
            assert_eq!((a, b), ('A', 'B'));
        } else {
            assert_eq!((a, b), ('B', 'A'));
        }
    }

    #[tokio::test]
    async fn test_store_letter_unknown_store() {
        let fx = fixture().await;

        let err = fx.db.companies().store_letter("no-such-store").await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::StoreNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_create_rejects_blank_name() {
        let fx = fixture().await;

        let err = fx.db.companies().create_company("   ").await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_warehouse_requires_existing_company() {
        let fx = fixture().await;

        let err = fx
            .db
            .companies()
            .create_warehouse("no-such-company", "Orphan")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
    }
}
