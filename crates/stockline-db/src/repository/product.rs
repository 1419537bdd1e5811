//! # Product Repository
//!
//! Product lifecycle operations. Every quantity-touching path here is ledger
//! backed: products are created by their first stock-in, restocked and
//! adjusted through movements, and soft-deleted so ledger history stays
//! referentially intact.
//!
//! ## Creation = First Stock-In
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      create(new_product)                                │
//! │                                                                         │
//! │  SINGLE category                       BULK category                    │
//! │  ├── SKU required, unique among        ├── merge into existing active   │
//! │  │   active products                   │   product (same name+category) │
//! │  ├── insert row (quantity 0)           │   or insert row (quantity 0)   │
//! │  └── purchase movement +1              └── purchase movement +qty       │
//! │                                                                         │
//! │  Both paths leave quantity/status derived from the ledger entry,       │
//! │  never set directly.                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use stockline_core::state::StockPolicy;
use stockline_core::validation::{validate_name, validate_price_cents, validate_quantity, validate_sku};
use stockline_core::{EntryKind, ItemKind, Product, StockError, ValidationError};

use crate::error::{DbError, DbResult};
use crate::repository::ledger::{apply_movement, apply_to_locked, lock_and_fetch, Movement};

/// Base SELECT for product reads. The owning category's item kind is joined
/// in on every read; it is not stored on the product row.
pub(crate) const PRODUCT_SELECT: &str = r#"
    SELECT p.id, p.code, p.category_id, c.item_kind AS item_kind,
           p.sku_value, p.name, p.quantity, p.status,
           p.buying_price_cents, p.selling_price_cents,
           p.owner_id, p.is_active, p.created_at, p.updated_at
    FROM products p
    INNER JOIN categories c ON c.id = p.category_id
"#;

// =============================================================================
// Requests
// =============================================================================

/// Input for creating a product (its first stock-in).
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub category_id: String,
    pub name: String,
    /// Required for single categories, informational for bulk.
    pub sku_value: Option<String>,
    /// Initial stock. Forced to 1 for single categories.
    pub quantity: i64,
    pub buying_price_cents: i64,
    pub selling_price_cents: i64,
    pub owner_id: Option<String>,
    pub actor: Option<String>,
}

/// Input for restocking a bulk product.
#[derive(Debug, Clone)]
pub struct RestockRequest {
    pub quantity: i64,
    pub buying_price_cents: i64,
    /// Updates the selling price when provided.
    pub selling_price_cents: Option<i64>,
    pub notes: Option<String>,
    pub actor: Option<String>,
}

/// Outcome of an ownership transfer.
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    /// The source product after the transfer.
    pub source: Product,
    /// The product created for the receiving owner (bulk transfers only;
    /// single items keep their record and just change owner).
    pub transferred: Option<Product>,
}

/// Inventory dashboard counters.
#[derive(Debug, Clone, Default)]
pub struct InventoryStats {
    pub total_products: i64,
    pub single_available: i64,
    pub single_sold: i64,
    pub bulk_available: i64,
    pub bulk_lowstock: i64,
    pub bulk_outofstock: i64,
    /// Σ quantity × buying price over active products.
    pub inventory_value_cents: i64,
}

// =============================================================================
// Product Repository
// =============================================================================

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
///
/// let product = repo.create(new_product).await?;
/// let found = repo.lookup("IMEI:356938035643809").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
    policy: StockPolicy,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool, policy: StockPolicy) -> Self {
        ProductRepository { pool, policy }
    }

    // -------------------------------------------------------------------------
    // Creation (first stock-in)
    // -------------------------------------------------------------------------

    /// Creates a product through its first stock-in.
    ///
    /// ## Single categories
    /// The SKU value is required and must be unique among active products; the
    /// initial quantity is one unit regardless of the request.
    ///
    /// ## Bulk categories
    /// An active product with the same name in the same category absorbs the
    /// stock instead of creating a duplicate row.
    pub async fn create(&self, new: NewProduct) -> DbResult<Product> {
        validate_name(&new.name).map_err(StockError::from)?;
        validate_price_cents(new.buying_price_cents).map_err(StockError::from)?;
        validate_price_cents(new.selling_price_cents).map_err(StockError::from)?;

        let mut tx = self.pool.begin().await?;

        let category: (String, ItemKind) =
            sqlx::query_as("SELECT category_code, item_kind FROM categories WHERE id = ?1")
                .bind(&new.category_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| DbError::not_found("Category", &new.category_id))?;
        let (category_code, item_kind) = category;

        let product_id = match item_kind {
            ItemKind::Single => {
                let sku = new
                    .sku_value
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| {
                        StockError::from(ValidationError::Required {
                            field: "sku_value".to_string(),
                        })
                    })?;
                validate_sku(sku).map_err(StockError::from)?;

                let taken: bool = sqlx::query_scalar(
                    "SELECT EXISTS(SELECT 1 FROM products WHERE sku_value = ?1 AND is_active = 1)",
                )
                .bind(sku)
                .fetch_one(&mut *tx)
                .await?;
                if taken {
                    return Err(DbError::duplicate("sku_value", sku));
                }

                let id = insert_product_row(&mut tx, &new, &category_code, Some(sku)).await?;

                apply_movement(
                    &mut tx,
                    &self.policy,
                    &id,
                    Movement::new(1, EntryKind::Purchase, new.buying_price_cents)
                        .with_notes("Initial single item stock entry")
                        .with_actor(new.actor.clone().unwrap_or_default()),
                )
                .await?;

                id
            }
            ItemKind::Bulk => {
                validate_quantity(new.quantity).map_err(StockError::from)?;

                let existing: Option<String> = sqlx::query_scalar(
                    "SELECT id FROM products WHERE name = ?1 AND category_id = ?2 AND is_active = 1",
                )
                .bind(new.name.trim())
                .bind(&new.category_id)
                .fetch_optional(&mut *tx)
                .await?;

                let id = match existing {
                    Some(id) => {
                        debug!(product_id = %id, name = %new.name, "Merging stock into existing bulk product");
                        id
                    }
                    None => {
                        insert_product_row(&mut tx, &new, &category_code, new.sku_value.as_deref())
                            .await?
                    }
                };

                apply_movement(
                    &mut tx,
                    &self.policy,
                    &id,
                    Movement::new(new.quantity, EntryKind::Purchase, new.buying_price_cents)
                        .with_notes("Initial stock entry")
                        .with_actor(new.actor.clone().unwrap_or_default()),
                )
                .await?;

                id
            }
        };

        let product = fetch_product(&mut tx, &product_id).await?;
        tx.commit().await?;

        info!(
            code = %product.code,
            name = %product.name,
            kind = %product.item_kind,
            quantity = product.quantity,
            "Product created"
        );

        Ok(product)
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    /// Gets a product by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!("{PRODUCT_SELECT} WHERE p.id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Gets a product by its business code.
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!("{PRODUCT_SELECT} WHERE p.code = ?1"))
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Looks up an active product by exact code or SKU value.
    ///
    /// This is the scan path a checkout surface uses.
    pub async fn lookup(&self, code_or_sku: &str) -> DbResult<Option<Product>> {
        let term = code_or_sku.trim();

        let product = sqlx::query_as::<_, Product>(&format!(
            "{PRODUCT_SELECT} WHERE (p.code = ?1 OR p.sku_value = ?1) AND p.is_active = 1"
        ))
        .bind(term)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Searches active products by name, code, or SKU substring.
    pub async fn search(&self, query: &str, limit: u32) -> DbResult<Vec<Product>> {
        let query = query.trim();

        debug!(query = %query, limit = %limit, "Searching products");

        if query.is_empty() {
            return self.list_active(limit).await;
        }

        let pattern = format!("%{}%", query);

        let products = sqlx::query_as::<_, Product>(&format!(
            r#"{PRODUCT_SELECT}
            WHERE p.is_active = 1
              AND (p.name LIKE ?1 OR p.code LIKE ?1 OR p.sku_value LIKE ?1)
            ORDER BY p.created_at DESC
            LIMIT ?2"#
        ))
        .bind(&pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        debug!(count = products.len(), "Search returned products");
        Ok(products)
    }

    /// Lists active products sorted by name.
    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "{PRODUCT_SELECT} WHERE p.is_active = 1 ORDER BY p.name LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Counts active products.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // -------------------------------------------------------------------------
    // Stock operations
    // -------------------------------------------------------------------------

    /// Restocks a bulk product.
    ///
    /// Single items are rejected with a precise reason: each single item is
    /// one physical unit and must be added as a new product record.
    pub async fn restock(&self, product_id: &str, request: RestockRequest) -> DbResult<Product> {
        validate_quantity(request.quantity).map_err(StockError::from)?;
        validate_price_cents(request.buying_price_cents).map_err(StockError::from)?;

        let mut tx = self.pool.begin().await?;

        let product = lock_and_fetch(&mut tx, product_id).await?;
        if !product.is_active {
            return Err(DbError::not_found("Product", product_id));
        }
        if product.item_kind == ItemKind::Single {
            return Err(StockError::CannotRestockSingleItem {
                code: product.code.clone(),
            }
            .into());
        }

        apply_to_locked(
            &mut tx,
            &self.policy,
            &product,
            Movement::new(request.quantity, EntryKind::Purchase, request.buying_price_cents)
                .with_notes(request.notes.unwrap_or_else(|| "Restock".to_string()))
                .with_actor(request.actor.unwrap_or_default()),
        )
        .await?;

        sqlx::query(
            r#"
            UPDATE products
            SET buying_price_cents = ?2,
                selling_price_cents = COALESCE(?3, selling_price_cents),
                updated_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(product_id)
        .bind(request.buying_price_cents)
        .bind(request.selling_price_cents)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        let product = fetch_product(&mut tx, product_id).await?;
        tx.commit().await?;

        info!(code = %product.code, quantity = product.quantity, "Product restocked");
        Ok(product)
    }

    /// Sets a product's quantity through a reconciling adjustment entry.
    ///
    /// Administrative edits never write quantity directly; the difference
    /// between the old and new quantity becomes an `adjustment` movement so
    /// the ledger-sum invariant holds.
    pub async fn set_quantity(
        &self,
        product_id: &str,
        new_quantity: i64,
        actor: Option<&str>,
    ) -> DbResult<Product> {
        let mut tx = self.pool.begin().await?;

        let product = lock_and_fetch(&mut tx, product_id).await?;
        let diff = new_quantity - product.quantity;

        if diff != 0 {
            apply_to_locked(
                &mut tx,
                &self.policy,
                &product,
                Movement::new(diff, EntryKind::Adjustment, product.buying_price_cents)
                    .with_notes(format!(
                        "Manual adjustment: {} -> {}",
                        product.quantity, new_quantity
                    ))
                    .with_actor(actor.unwrap_or_default()),
            )
            .await?;
        }

        let product = fetch_product(&mut tx, product_id).await?;
        tx.commit().await?;

        Ok(product)
    }

    /// Transfers product ownership to another operator.
    ///
    /// ## Single items
    /// The whole record changes owner; the quantity does not move, so no
    /// ledger entry is written.
    ///
    /// ## Bulk items
    /// The requested quantity splits into a new product owned by the
    /// receiver; both sides record zero-value `adjustment` entries so each
    /// product's ledger stays in step with its quantity.
    pub async fn transfer(
        &self,
        product_id: &str,
        to_owner: &str,
        quantity: i64,
        actor: Option<&str>,
    ) -> DbResult<TransferOutcome> {
        let mut tx = self.pool.begin().await?;

        let product = lock_and_fetch(&mut tx, product_id).await?;
        if !product.is_active {
            return Err(DbError::not_found("Product", product_id));
        }

        let outcome = match product.item_kind {
            ItemKind::Single => {
                sqlx::query("UPDATE products SET owner_id = ?2, updated_at = ?3 WHERE id = ?1")
                    .bind(product_id)
                    .bind(to_owner)
                    .bind(Utc::now())
                    .execute(&mut *tx)
                    .await?;

                info!(code = %product.code, to_owner = %to_owner, "Single item ownership transferred");

                let source = fetch_product(&mut tx, product_id).await?;
                TransferOutcome {
                    source,
                    transferred: None,
                }
            }
            ItemKind::Bulk => {
                validate_quantity(quantity).map_err(StockError::from)?;
                if quantity > product.quantity {
                    return Err(StockError::InsufficientStock {
                        code: product.code.clone(),
                        available: product.quantity,
                        requested: quantity,
                    }
                    .into());
                }

                // Debit the source; a transfer moves no money, so the
                // entry's total is explicitly zero.
                apply_to_locked(
                    &mut tx,
                    &self.policy,
                    &product,
                    Movement::new(-quantity, EntryKind::Adjustment, product.buying_price_cents)
                        .with_total_override(0)
                        .with_notes(format!("Transferred {} units to {}", quantity, to_owner))
                        .with_actor(actor.unwrap_or_default()),
                )
                .await?;

                // Credit a fresh product owned by the receiver
                let category_code: String =
                    sqlx::query_scalar("SELECT category_code FROM categories WHERE id = ?1")
                        .bind(&product.category_id)
                        .fetch_one(&mut *tx)
                        .await?;

                let received = NewProduct {
                    category_id: product.category_id.clone(),
                    name: product.name.clone(),
                    sku_value: product.sku_value.clone(),
                    quantity,
                    buying_price_cents: product.buying_price_cents,
                    selling_price_cents: product.selling_price_cents,
                    owner_id: Some(to_owner.to_string()),
                    actor: actor.map(str::to_string),
                };
                let new_id = insert_product_row(
                    &mut tx,
                    &received,
                    &category_code,
                    received.sku_value.as_deref(),
                )
                .await?;

                apply_movement(
                    &mut tx,
                    &self.policy,
                    &new_id,
                    Movement::new(quantity, EntryKind::Adjustment, product.buying_price_cents)
                        .with_total_override(0)
                        .with_notes(format!("Received {} units from {}", quantity, product.code))
                        .with_actor(actor.unwrap_or_default()),
                )
                .await?;

                info!(
                    code = %product.code,
                    to_owner = %to_owner,
                    quantity = quantity,
                    "Bulk stock transferred"
                );

                let source = fetch_product(&mut tx, product_id).await?;
                let transferred = fetch_product(&mut tx, &new_id).await?;
                TransferOutcome {
                    source,
                    transferred: Some(transferred),
                }
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    // -------------------------------------------------------------------------
    // Deactivation
    // -------------------------------------------------------------------------

    /// Soft-deletes a product by setting is_active = false.
    ///
    /// Historical sales and ledger entries still reference this product, so
    /// rows are never hard-deleted.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Soft-deleting product");

        let result = sqlx::query("UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Reporting
    // -------------------------------------------------------------------------

    /// Inventory statistics for a dashboard surface.
    pub async fn stats(&self) -> DbResult<InventoryStats> {
        let rows: Vec<(ItemKind, String, i64)> = sqlx::query_as(
            r#"
            SELECT c.item_kind, p.status, COUNT(*)
            FROM products p
            INNER JOIN categories c ON c.id = p.category_id
            WHERE p.is_active = 1
            GROUP BY c.item_kind, p.status
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut stats = InventoryStats::default();
        for (kind, status, count) in rows {
            stats.total_products += count;
            match (kind, status.as_str()) {
                (ItemKind::Single, "available") => stats.single_available = count,
                (ItemKind::Single, "sold") => stats.single_sold = count,
                (ItemKind::Bulk, "available") => stats.bulk_available = count,
                (ItemKind::Bulk, "lowstock") => stats.bulk_lowstock = count,
                (ItemKind::Bulk, "outofstock") => stats.bulk_outofstock = count,
                _ => {}
            }
        }

        let value: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(buying_price_cents * quantity), 0)
            FROM products
            WHERE is_active = 1 AND quantity > 0
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        stats.inventory_value_cents = value;

        Ok(stats)
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Inserts a product row with zero stock; the caller applies the first
/// movement.
async fn insert_product_row(
    tx: &mut SqliteConnection,
    new: &NewProduct,
    category_code: &str,
    sku_value: Option<&str>,
) -> DbResult<String> {
    let id = Uuid::new_v4().to_string();
    let code = generate_product_code(category_code);
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO products (
            id, code, category_id, sku_value, name,
            quantity, status, buying_price_cents, selling_price_cents,
            owner_id, is_active, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, 0, 'outofstock', ?6, ?7, ?8, 1, ?9, ?9)
        "#,
    )
    .bind(&id)
    .bind(&code)
    .bind(&new.category_id)
    .bind(sku_value)
    .bind(new.name.trim())
    .bind(new.buying_price_cents)
    .bind(new.selling_price_cents)
    .bind(&new.owner_id)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    debug!(id = %id, code = %code, "Product row inserted");
    Ok(id)
}

/// Fetches a product on an open connection.
pub(crate) async fn fetch_product(
    conn: &mut SqliteConnection,
    product_id: &str,
) -> DbResult<Product> {
    let product = sqlx::query_as::<_, Product>(&format!("{PRODUCT_SELECT} WHERE p.id = ?1"))
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Product", product_id))?;

    Ok(product)
}

/// Generates a product code: `<CATEGORY_CODE>-<8 hex>`.
pub fn generate_product_code(category_code: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
    format!("{}-{}", category_code, suffix)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::testutil::{bulk_product, single_product, test_category, test_db};
    use stockline_core::ProductStatus;

    #[tokio::test]
    async fn test_create_single_item() {
        let db = test_db().await;
        let cat = test_category(&db, "Phones", ItemKind::Single).await;

        let product = single_product(&db, &cat.id, "S24", "IMEI:123", 50_000).await;

        assert_eq!(product.quantity, 1);
        assert_eq!(product.status, ProductStatus::Available);
        assert!(product.code.starts_with(&cat.category_code));

        // A purchase entry backs the first stock-in
        let entries = db.ledger().entries_for_product(&product.id, 10).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].delta, 1);
        assert_eq!(entries[0].kind, EntryKind::Purchase);

        assert_eq!(db.ledger().ledger_sum(&product.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_create_single_requires_unique_sku() {
        let db = test_db().await;
        let cat = test_category(&db, "Phones", ItemKind::Single).await;
        single_product(&db, &cat.id, "S24", "IMEI:123", 50_000).await;

        let err = db
            .products()
            .create(NewProduct {
                category_id: cat.id.clone(),
                name: "S24 (second unit)".into(),
                sku_value: Some("IMEI:123".into()),
                quantity: 1,
                buying_price_cents: 50_000,
                selling_price_cents: 65_000,
                owner_id: None,
                actor: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_create_single_requires_sku() {
        let db = test_db().await;
        let cat = test_category(&db, "Phones", ItemKind::Single).await;

        let err = db
            .products()
            .create(NewProduct {
                category_id: cat.id.clone(),
                name: "S24".into(),
                sku_value: None,
                quantity: 1,
                buying_price_cents: 50_000,
                selling_price_cents: 65_000,
                owner_id: None,
                actor: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DbError::Domain(StockError::Validation(ValidationError::Required { .. }))
        ));
    }

    #[tokio::test]
    async fn test_create_bulk_merges_existing() {
        let db = test_db().await;
        let cat = test_category(&db, "Cables", ItemKind::Bulk).await;
        let first = bulk_product(&db, &cat.id, "USB-C", 10, 2500).await;

        let merged = db
            .products()
            .create(NewProduct {
                category_id: cat.id.clone(),
                name: "USB-C".into(),
                sku_value: None,
                quantity: 5,
                buying_price_cents: 2500,
                selling_price_cents: 4000,
                owner_id: None,
                actor: None,
            })
            .await
            .unwrap();

        assert_eq!(merged.id, first.id);
        assert_eq!(merged.quantity, 15);
        assert_eq!(db.ledger().ledger_sum(&merged.id).await.unwrap(), 15);
    }

    #[tokio::test]
    async fn test_restock_bulk_updates_prices() {
        let db = test_db().await;
        let cat = test_category(&db, "Cables", ItemKind::Bulk).await;
        let product = bulk_product(&db, &cat.id, "USB-C", 3, 2500).await;
        assert_eq!(product.status, ProductStatus::LowStock);

        let product = db
            .products()
            .restock(
                &product.id,
                RestockRequest {
                    quantity: 20,
                    buying_price_cents: 2600,
                    selling_price_cents: Some(4200),
                    notes: None,
                    actor: Some("admin".into()),
                },
            )
            .await
            .unwrap();

        assert_eq!(product.quantity, 23);
        assert_eq!(product.status, ProductStatus::Available);
        assert_eq!(product.buying_price_cents, 2600);
        assert_eq!(product.selling_price_cents, 4200);
        assert_eq!(db.ledger().ledger_sum(&product.id).await.unwrap(), 23);
    }

    #[tokio::test]
    async fn test_restock_single_is_rejected() {
        let db = test_db().await;
        let cat = test_category(&db, "Phones", ItemKind::Single).await;
        let product = single_product(&db, &cat.id, "S24", "IMEI:123", 50_000).await;

        let err = db
            .products()
            .restock(
                &product.id,
                RestockRequest {
                    quantity: 1,
                    buying_price_cents: 50_000,
                    selling_price_cents: None,
                    notes: None,
                    actor: None,
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DbError::Domain(StockError::CannotRestockSingleItem { .. })
        ));
    }

    #[tokio::test]
    async fn test_set_quantity_writes_adjustment() {
        let db = test_db().await;
        let cat = test_category(&db, "Cables", ItemKind::Bulk).await;
        let product = bulk_product(&db, &cat.id, "USB-C", 10, 2500).await;

        let product = db
            .products()
            .set_quantity(&product.id, 4, Some("admin"))
            .await
            .unwrap();

        assert_eq!(product.quantity, 4);
        assert_eq!(product.status, ProductStatus::LowStock);

        let entries = db.ledger().entries_for_product(&product.id, 10).await.unwrap();
        let adjustment = entries
            .iter()
            .find(|e| e.kind == EntryKind::Adjustment)
            .unwrap();
        assert_eq!(adjustment.delta, -6);

        assert_eq!(db.ledger().ledger_sum(&product.id).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_transfer_bulk_splits_stock() {
        let db = test_db().await;
        let cat = test_category(&db, "Cables", ItemKind::Bulk).await;
        let product = bulk_product(&db, &cat.id, "USB-C", 10, 2500).await;

        let outcome = db
            .products()
            .transfer(&product.id, "operator-2", 4, Some("admin"))
            .await
            .unwrap();

        assert_eq!(outcome.source.quantity, 6);
        let transferred = outcome.transferred.unwrap();
        assert_eq!(transferred.quantity, 4);
        assert_eq!(transferred.owner_id.as_deref(), Some("operator-2"));
        assert_ne!(transferred.code, outcome.source.code);

        // Both ledgers in step, and the transfer entries carry zero value
        assert_eq!(db.ledger().ledger_sum(&outcome.source.id).await.unwrap(), 6);
        assert_eq!(db.ledger().ledger_sum(&transferred.id).await.unwrap(), 4);
        let entries = db.ledger().entries_for_product(&transferred.id, 10).await.unwrap();
        assert_eq!(entries[0].total_amount_cents, 0);
    }

    #[tokio::test]
    async fn test_transfer_bulk_insufficient() {
        let db = test_db().await;
        let cat = test_category(&db, "Cables", ItemKind::Bulk).await;
        let product = bulk_product(&db, &cat.id, "USB-C", 3, 2500).await;

        let err = db
            .products()
            .transfer(&product.id, "operator-2", 5, None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DbError::Domain(StockError::InsufficientStock { .. })
        ));
    }

    #[tokio::test]
    async fn test_transfer_single_swaps_owner() {
        let db = test_db().await;
        let cat = test_category(&db, "Phones", ItemKind::Single).await;
        let product = single_product(&db, &cat.id, "S24", "IMEI:123", 50_000).await;
        let entries_before = db.ledger().entries_for_product(&product.id, 10).await.unwrap();

        let outcome = db
            .products()
            .transfer(&product.id, "operator-2", 1, None)
            .await
            .unwrap();

        assert_eq!(outcome.source.owner_id.as_deref(), Some("operator-2"));
        assert!(outcome.transferred.is_none());

        // No quantity moved, so no ledger entry was written
        let entries_after = db.ledger().entries_for_product(&product.id, 10).await.unwrap();
        assert_eq!(entries_before.len(), entries_after.len());
    }

    #[tokio::test]
    async fn test_lookup_by_code_and_sku() {
        let db = test_db().await;
        let cat = test_category(&db, "Phones", ItemKind::Single).await;
        let product = single_product(&db, &cat.id, "S24", "IMEI:123", 50_000).await;

        let by_code = db.products().lookup(&product.code).await.unwrap().unwrap();
        assert_eq!(by_code.id, product.id);

        let by_sku = db.products().lookup("IMEI:123").await.unwrap().unwrap();
        assert_eq!(by_sku.id, product.id);

        assert!(db.products().lookup("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_soft_delete_hides_from_lookup() {
        let db = test_db().await;
        let cat = test_category(&db, "Cables", ItemKind::Bulk).await;
        let product = bulk_product(&db, &cat.id, "USB-C", 10, 2500).await;

        db.products().soft_delete(&product.id).await.unwrap();

        assert!(db.products().lookup("USB-C").await.unwrap().is_none());
        assert_eq!(db.products().count().await.unwrap(), 0);

        // Still reachable by id for history views
        let by_id = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert!(!by_id.is_active);
    }

    #[tokio::test]
    async fn test_search_matches_name_code_sku() {
        let db = test_db().await;
        let cat = test_category(&db, "Cables", ItemKind::Bulk).await;
        bulk_product(&db, &cat.id, "USB-C Cable", 10, 2500).await;
        bulk_product(&db, &cat.id, "HDMI Cable", 10, 2500).await;

        let hits = db.products().search("usb", 20).await.unwrap();
        assert_eq!(hits.len(), 1);

        let hits = db.products().search("cable", 20).await.unwrap();
        assert_eq!(hits.len(), 2);

        let all = db.products().search("", 20).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_stats() {
        let db = test_db().await;
        let phones = test_category(&db, "Phones", ItemKind::Single).await;
        let cables = test_category(&db, "Cables", ItemKind::Bulk).await;
        single_product(&db, &phones.id, "S24", "IMEI:123", 50_000).await;
        bulk_product(&db, &cables.id, "USB-C", 3, 2500).await;

        let stats = db.products().stats().await.unwrap();
        assert_eq!(stats.total_products, 2);
        assert_eq!(stats.single_available, 1);
        assert_eq!(stats.bulk_lowstock, 1);
        assert_eq!(stats.inventory_value_cents, 50_000 + 3 * 2500);
    }
}
