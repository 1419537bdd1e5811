//! # Category Repository
//!
//! Category CRUD and the item-kind reconciliation protocol.
//!
//! ## Kind Change Reconciliation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   set_item_kind(category, new_kind)                     │
//! │                                                                         │
//! │  Rare administrative operation, never a hot path. For every active     │
//! │  product of the category (ascending id order, each under its lock):    │
//! │                                                                         │
//! │  → single: quantity clamps to {0,1}; the clamp delta is recorded as    │
//! │            an adjustment entry and logged as a warning                  │
//! │  → bulk:   quantity unchanged; status re-derived under bulk thresholds │
//! │                                                                         │
//! │  The warning never blocks the operation - it is the audit trail of an  │
//! │  intentional administrative decision.                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use stockline_core::state::StockPolicy;
use stockline_core::validation::validate_name;
use stockline_core::{Category, ItemKind, SkuKind, StockError};

use crate::error::{DbError, DbResult};
use crate::repository::ledger::{apply_reconciliation, lock_and_fetch};

const CATEGORY_SELECT: &str = r#"
    SELECT id, name, category_code, item_kind, sku_kind, created_at, updated_at
    FROM categories
"#;

// =============================================================================
// Requests
// =============================================================================

/// Input for creating a category.
#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub item_kind: ItemKind,
    pub sku_kind: SkuKind,
}

// =============================================================================
// Category Repository
// =============================================================================

/// Repository for category database operations.
#[derive(Debug, Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
    policy: StockPolicy,
}

impl CategoryRepository {
    /// Creates a new CategoryRepository.
    pub fn new(pool: SqlitePool, policy: StockPolicy) -> Self {
        CategoryRepository { pool, policy }
    }

    /// Creates a category with a generated short code.
    pub async fn create(&self, new: NewCategory) -> DbResult<Category> {
        validate_name(&new.name).map_err(StockError::from)?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let name = new.name.trim().to_string();

        // First try the plain prefix; disambiguate on collision
        let mut code = generate_category_code(&name);
        let taken: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM categories WHERE category_code = ?1)")
                .bind(&code)
                .fetch_one(&self.pool)
                .await?;
        if taken {
            let suffix = Uuid::new_v4().simple().to_string()[..2].to_uppercase();
            code = format!("{}{}", code, suffix);
        }

        sqlx::query(
            r#"
            INSERT INTO categories (id, name, category_code, item_kind, sku_kind, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            "#,
        )
        .bind(&id)
        .bind(&name)
        .bind(&code)
        .bind(new.item_kind)
        .bind(new.sku_kind)
        .bind(now)
        .execute(&self.pool)
        .await?;

        info!(name = %name, code = %code, kind = %new.item_kind, "Category created");

        Ok(Category {
            id,
            name,
            category_code: code,
            item_kind: new.item_kind,
            sku_kind: new.sku_kind,
            created_at: now,
            updated_at: now,
        })
    }

    /// Gets a category by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Category>> {
        let category = sqlx::query_as::<_, Category>(&format!("{CATEGORY_SELECT} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(category)
    }

    /// Lists all categories sorted by name.
    pub async fn list(&self) -> DbResult<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(&format!("{CATEGORY_SELECT} ORDER BY name"))
            .fetch_all(&self.pool)
            .await?;

        Ok(categories)
    }

    /// Counts active products referencing a category.
    pub async fn product_count(&self, id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM products WHERE category_id = ?1 AND is_active = 1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Deletes a category.
    ///
    /// Refused while any product - active or not - references it; ledger
    /// history must keep resolving.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let referencing: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE category_id = ?1")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        if referencing > 0 {
            return Err(DbError::ForeignKeyViolation {
                message: format!("cannot delete category: {} products reference it", referencing),
            });
        }

        let result = sqlx::query("DELETE FROM categories WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Category", id));
        }

        Ok(())
    }

    /// Changes a category's item kind, reconciling every product.
    ///
    /// One transaction covers the category update and all product
    /// reconciliations; a failure anywhere rolls the whole change back.
    pub async fn set_item_kind(&self, id: &str, new_kind: ItemKind, actor: Option<&str>) -> DbResult<Category> {
        let mut tx = self.pool.begin().await?;

        let category =
            sqlx::query_as::<_, Category>(&format!("{CATEGORY_SELECT} WHERE id = ?1"))
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| DbError::not_found("Category", id))?;

        if category.item_kind == new_kind {
            debug!(id = %id, kind = %new_kind, "Category already has this item kind; no-op");
            return Ok(category);
        }

        warn!(
            category = %category.name,
            old_kind = %category.item_kind,
            new_kind = %new_kind,
            "Category kind change detected; reconciling products"
        );

        let now = Utc::now();
        sqlx::query("UPDATE categories SET item_kind = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(new_kind)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        // Reconcile every active product, each under its own lock, in
        // ascending id order
        let product_ids: Vec<String> = sqlx::query_scalar(
            "SELECT id FROM products WHERE category_id = ?1 AND is_active = 1 ORDER BY id",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        for product_id in &product_ids {
            let product = lock_and_fetch(&mut tx, product_id).await?;
            apply_reconciliation(&mut tx, &self.policy, &product, new_kind, actor).await?;
        }

        tx.commit().await?;

        info!(
            category = %category.name,
            products = product_ids.len(),
            new_kind = %new_kind,
            "Category kind changed"
        );

        Ok(Category {
            item_kind: new_kind,
            updated_at: now,
            ..category
        })
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Derives a short category code from the name: the first three
/// alphanumerics, uppercased (`"Phones"` -> `"PHO"`).
fn generate_category_code(name: &str) -> String {
    let code: String = name
        .chars()
        .filter(|c| c.is_alphanumeric())
        .take(3)
        .collect::<String>()
        .to_uppercase();

    if code.is_empty() {
        "CAT".to_string()
    } else {
        code
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::testutil::{bulk_product, single_product, test_category, test_db};
    use stockline_core::{EntryKind, ProductStatus};

    #[tokio::test]
    async fn test_create_generates_code() {
        let db = test_db().await;
        let cat = db
            .categories()
            .create(NewCategory {
                name: "Phones".into(),
                item_kind: ItemKind::Single,
                sku_kind: SkuKind::Imei,
            })
            .await
            .unwrap();

        assert_eq!(cat.category_code, "PHO");
        assert_eq!(cat.item_kind, ItemKind::Single);
    }

    #[tokio::test]
    async fn test_code_collision_is_disambiguated() {
        let db = test_db().await;
        let first = test_category(&db, "Phones", ItemKind::Single).await;
        let second = db
            .categories()
            .create(NewCategory {
                name: "Phone Cases".into(),
                item_kind: ItemKind::Bulk,
                sku_kind: SkuKind::Barcode,
            })
            .await
            .unwrap();

        assert_eq!(first.category_code, "PHO");
        assert_ne!(second.category_code, "PHO");
        assert!(second.category_code.starts_with("PHO"));
    }

    #[tokio::test]
    async fn test_duplicate_name_is_rejected() {
        let db = test_db().await;
        test_category(&db, "Phones", ItemKind::Single).await;

        let err = db
            .categories()
            .create(NewCategory {
                name: "Phones".into(),
                item_kind: ItemKind::Single,
                sku_kind: SkuKind::Imei,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_delete_guard_while_referenced() {
        let db = test_db().await;
        let cat = test_category(&db, "Cables", ItemKind::Bulk).await;
        bulk_product(&db, &cat.id, "USB-C", 10, 2500).await;

        let err = db.categories().delete(&cat.id).await.unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));

        let empty = test_category(&db, "Chargers", ItemKind::Bulk).await;
        db.categories().delete(&empty.id).await.unwrap();
        assert!(db.categories().get_by_id(&empty.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_kind_change_to_single_clamps_with_ledger_entry() {
        let db = test_db().await;
        let cat = test_category(&db, "Cables", ItemKind::Bulk).await;
        let product = bulk_product(&db, &cat.id, "USB-C", 7, 2500).await;

        let updated = db
            .categories()
            .set_item_kind(&cat.id, ItemKind::Single, Some("admin"))
            .await
            .unwrap();
        assert_eq!(updated.item_kind, ItemKind::Single);

        let product = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(product.quantity, 1);
        assert_eq!(product.status, ProductStatus::Available);
        assert_eq!(product.item_kind, ItemKind::Single);

        // The clamp delta landed in the ledger, keeping the sum invariant
        let entries = db.ledger().entries_for_product(&product.id, 10).await.unwrap();
        let clamp = entries
            .iter()
            .find(|e| e.kind == EntryKind::Adjustment)
            .unwrap();
        assert_eq!(clamp.delta, -6);
        assert_eq!(db.ledger().ledger_sum(&product.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_kind_change_to_bulk_rederives_status() {
        let db = test_db().await;
        let cat = test_category(&db, "Phones", ItemKind::Single).await;
        let product = single_product(&db, &cat.id, "S24", "IMEI:123", 50_000).await;
        assert_eq!(product.status, ProductStatus::Available);

        db.categories()
            .set_item_kind(&cat.id, ItemKind::Bulk, None)
            .await
            .unwrap();

        // Quantity unchanged; one unit is below the bulk threshold
        let product = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(product.quantity, 1);
        assert_eq!(product.status, ProductStatus::LowStock);

        // No ledger entry for a pure status re-derivation
        let entries = db.ledger().entries_for_product(&product.id, 10).await.unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_kind_change_same_kind_is_noop() {
        let db = test_db().await;
        let cat = test_category(&db, "Cables", ItemKind::Bulk).await;

        let unchanged = db
            .categories()
            .set_item_kind(&cat.id, ItemKind::Bulk, None)
            .await
            .unwrap();
        assert_eq!(unchanged.item_kind, ItemKind::Bulk);
    }
}
