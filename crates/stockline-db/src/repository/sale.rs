//! # Sale Repository
//!
//! Checkout, reversal, deletion, and receipt numbering.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Lifecycle                                    │
//! │                                                                         │
//! │  1. CHECKOUT (atomic, all-or-nothing)                                  │
//! │     └── per line, ascending product id:                                │
//! │         lock product → verify under lock → sale entry (delta -qty)     │
//! │     └── snapshot code/name/SKU onto each item                          │
//! │     └── totals: Σqty, Σline, subtotal + tax                            │
//! │                                                                         │
//! │  2. (OPTIONAL) ASSIGN RECEIPT                                          │
//! │     └── monotone counter, at most once per sale, idempotent            │
//! │                                                                         │
//! │  3. (OPTIONAL) REVERSE - one-way, idempotent                           │
//! │     └── guarded flip of is_reversed                                    │
//! │     └── per item: return entry (delta +qty) ref REVERSE-<sale-id>      │
//! │                                                                         │
//! │  4. (EXCEPTIONAL) DELETE                                               │
//! │     └── capture {product, qty, price} tuples → delete → compensate     │
//! │         with return entries ref DELETE-<sale-id>                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reversal and deletion restore stock through the same movement protocol as
//! checkout, so both produce identical product outcomes for identical
//! inputs.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use stockline_core::state::StockPolicy;
use stockline_core::validation::{validate_line_count, validate_price_cents, validate_quantity};
use stockline_core::{EntryKind, Sale, SaleItem, SaleWithItems, StockError};

use crate::error::{DbError, DbResult};
use crate::repository::ledger::{apply_movement, apply_to_locked, lock_and_fetch, Movement};

const SALE_SELECT: &str = r#"
    SELECT id, seller_id, buyer_name, buyer_phone, buyer_id_number,
           total_quantity, subtotal_cents, tax_cents, total_cents,
           is_reversed, reversed_at, reversed_by, reversal_reason,
           receipt_number, receipt_counter, receipt_processed_at,
           created_at, updated_at
    FROM sales
"#;

const ITEM_SELECT: &str = r#"
    SELECT id, sale_id, product_id,
           product_code_snapshot, product_name_snapshot, sku_snapshot,
           quantity, unit_price_cents, total_price_cents, created_at
    FROM sale_items
"#;

// =============================================================================
// Requests
// =============================================================================

/// One requested checkout line.
#[derive(Debug, Clone)]
pub struct CheckoutLine {
    pub product_id: String,
    pub quantity: i64,
    /// Unit price override in cents; the product's selling price when `None`.
    pub unit_price_cents: Option<i64>,
}

/// Optional walk-in buyer details.
#[derive(Debug, Clone, Default)]
pub struct BuyerDetails {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub id_number: Option<String>,
}

/// A checkout request: one or more lines sold as one atomic transaction.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub seller_id: String,
    pub buyer: BuyerDetails,
    pub lines: Vec<CheckoutLine>,
    /// Tax in cents, computed by the caller's tax policy.
    pub tax_cents: i64,
}

// =============================================================================
// Sale Repository
// =============================================================================

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
    policy: StockPolicy,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool, policy: StockPolicy) -> Self {
        SaleRepository { pool, policy }
    }

    // -------------------------------------------------------------------------
    // Checkout
    // -------------------------------------------------------------------------

    /// Checks out one or more line items as one atomic sale.
    ///
    /// ## All-or-Nothing
    /// Every line must verify and debit under its product's lock; a failure
    /// at any line rolls the whole transaction back, leaving the ledger and
    /// every product untouched.
    ///
    /// ## Errors
    /// * `InsufficientStock` - a bulk line exceeds the available quantity
    /// * `ProductNotAvailable` - a single item is not currently available
    /// * `NotFound` - a line references an unknown or inactive product
    /// * `ConcurrencyTimeout` - lock wait exceeded; safe to retry
    pub async fn checkout(&self, request: CheckoutRequest) -> DbResult<SaleWithItems> {
        validate_line_count(request.lines.len()).map_err(StockError::from)?;
        for line in &request.lines {
            validate_quantity(line.quantity).map_err(StockError::from)?;
        }

        // Fixed deterministic lock order across concurrent multi-line sales
        let mut lines = request.lines;
        lines.sort_by(|a, b| a.product_id.cmp(&b.product_id));

        let sale_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        let mut items: Vec<SaleItem> = Vec::with_capacity(lines.len());
        let mut total_quantity: i64 = 0;
        let mut subtotal_cents: i64 = 0;

        for line in &lines {
            let product = lock_and_fetch(&mut tx, &line.product_id).await?;
            if !product.is_active {
                return Err(DbError::not_found("Product", &line.product_id));
            }

            let unit_price_cents = line.unit_price_cents.unwrap_or(product.selling_price_cents);
            validate_price_cents(unit_price_cents).map_err(StockError::from)?;

            // The debit verifies availability under the lock: single items
            // must be available, bulk quantities must cover the request.
            apply_to_locked(
                &mut tx,
                &self.policy,
                &product,
                Movement::new(-line.quantity, EntryKind::Sale, unit_price_cents)
                    .with_reference(sale_id.clone())
                    .with_notes(format!("Sale {}", sale_id))
                    .with_actor(request.seller_id.clone()),
            )
            .await?;

            // Snapshot immutable fields so later catalog edits never alter
            // this receipt
            items.push(SaleItem {
                id: Uuid::new_v4().to_string(),
                sale_id: sale_id.clone(),
                product_id: product.id.clone(),
                product_code_snapshot: product.code.clone(),
                product_name_snapshot: product.name.clone(),
                sku_snapshot: product.sku_value.clone(),
                quantity: line.quantity,
                unit_price_cents,
                total_price_cents: unit_price_cents * line.quantity,
                created_at: now,
            });

            total_quantity += line.quantity;
            subtotal_cents += unit_price_cents * line.quantity;
        }

        let sale = Sale {
            id: sale_id.clone(),
            seller_id: request.seller_id,
            buyer_name: request.buyer.name,
            buyer_phone: request.buyer.phone,
            buyer_id_number: request.buyer.id_number,
            total_quantity,
            subtotal_cents,
            tax_cents: request.tax_cents,
            total_cents: subtotal_cents + request.tax_cents,
            is_reversed: false,
            reversed_at: None,
            reversed_by: None,
            reversal_reason: None,
            receipt_number: None,
            receipt_counter: None,
            receipt_processed_at: None,
            created_at: now,
            updated_at: now,
        };

        insert_sale(&mut tx, &sale).await?;
        for item in &items {
            insert_item(&mut tx, item).await?;
        }

        tx.commit().await?;

        info!(
            sale_id = %sale.id,
            seller = %sale.seller_id,
            items = items.len(),
            total_quantity = sale.total_quantity,
            total_cents = sale.total_cents,
            "Sale recorded"
        );

        Ok(SaleWithItems { sale, items })
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    /// Gets a sale by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(&format!("{SALE_SELECT} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(sale)
    }

    /// Gets a sale with its items; the read model handed to the fiscal
    /// receipt collaborator.
    pub async fn get_with_items(&self, id: &str) -> DbResult<SaleWithItems> {
        let sale = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", id))?;
        let items = self.get_items(id).await?;

        Ok(SaleWithItems { sale, items })
    }

    /// Gets all items for a sale.
    pub async fn get_items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as::<_, SaleItem>(&format!(
            "{ITEM_SELECT} WHERE sale_id = ?1 ORDER BY created_at, id"
        ))
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Lists recent sales, newest first.
    pub async fn list_recent(&self, limit: u32) -> DbResult<Vec<Sale>> {
        let sales =
            sqlx::query_as::<_, Sale>(&format!("{SALE_SELECT} ORDER BY created_at DESC LIMIT ?1"))
                .bind(limit)
                .fetch_all(&self.pool)
                .await?;

        Ok(sales)
    }

    // -------------------------------------------------------------------------
    // Receipt numbering
    // -------------------------------------------------------------------------

    /// Assigns the next fiscal receipt number to a sale.
    ///
    /// The counter draw and the assignment commit together; the
    /// `receipt_number IS NULL` guard makes re-invocation a no-op that
    /// returns the already-assigned number. Numbers are monotonically
    /// increasing and never reused.
    pub async fn assign_receipt(&self, sale_id: &str) -> DbResult<Sale> {
        let mut tx = self.pool.begin().await?;

        let sale = fetch_sale(&mut tx, sale_id).await?;
        if sale.has_receipt() {
            debug!(sale_id = %sale_id, receipt = ?sale.receipt_number, "Receipt already assigned; no-op");
            return Ok(sale);
        }

        let counter: i64 =
            sqlx::query_scalar("UPDATE receipt_counter SET value = value + 1 WHERE id = 1 RETURNING value")
                .fetch_one(&mut *tx)
                .await?;
        let receipt_number = format!("RCPT-{:06}", counter);
        let now = Utc::now();

        let updated = sqlx::query(
            r#"
            UPDATE sales
            SET receipt_number = ?2, receipt_counter = ?3,
                receipt_processed_at = ?4, updated_at = ?4
            WHERE id = ?1 AND receipt_number IS NULL
            "#,
        )
        .bind(sale_id)
        .bind(&receipt_number)
        .bind(counter)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            // Assigned concurrently; drop the drawn counter with the rollback
            drop(tx);
            return fetch_sale_pool(&self.pool, sale_id).await;
        }

        tx.commit().await?;

        info!(sale_id = %sale_id, receipt = %receipt_number, counter = counter, "Receipt number assigned");
        fetch_sale_pool(&self.pool, sale_id).await
    }

    // -------------------------------------------------------------------------
    // Reversal
    // -------------------------------------------------------------------------

    /// Reverses a sale, restoring stock for every item.
    ///
    /// ## One-Way, Idempotent
    /// The `is_reversed` flip is guarded (`... AND is_reversed = 0`) and
    /// commits atomically with the compensating entries. Reversing an
    /// already-reversed sale is a no-op: no duplicate entries, no quantity
    /// drift.
    pub async fn reverse_sale(
        &self,
        sale_id: &str,
        reason: Option<&str>,
        actor: &str,
    ) -> DbResult<SaleWithItems> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        // The one-way state transition, checked and committed atomically
        let flipped = sqlx::query(
            r#"
            UPDATE sales
            SET is_reversed = 1, reversed_at = ?2, reversed_by = ?3,
                reversal_reason = ?4, updated_at = ?2
            WHERE id = ?1 AND is_reversed = 0
            "#,
        )
        .bind(sale_id)
        .bind(now)
        .bind(actor)
        .bind(reason)
        .execute(&mut *tx)
        .await?;

        if flipped.rows_affected() == 0 {
            drop(tx);
            let sale = self
                .get_by_id(sale_id)
                .await?
                .ok_or_else(|| DbError::not_found("Sale", sale_id))?;
            debug!(sale_id = %sale_id, "Sale already reversed; no-op");
            debug_assert!(sale.is_reversed);
            return self.get_with_items(sale_id).await;
        }

        let mut items = sqlx::query_as::<_, SaleItem>(&format!(
            "{ITEM_SELECT} WHERE sale_id = ?1 ORDER BY created_at, id"
        ))
        .bind(sale_id)
        .fetch_all(&mut *tx)
        .await?;
        items.sort_by(|a, b| a.product_id.cmp(&b.product_id));

        for item in &items {
            apply_movement(
                &mut tx,
                &self.policy,
                &item.product_id,
                Movement::new(item.quantity, EntryKind::Return, item.unit_price_cents)
                    .with_reference(format!("REVERSE-{}", sale_id))
                    .with_notes(format!("Reversal of sale {}", sale_id))
                    .with_actor(actor),
            )
            .await?;
        }

        tx.commit().await?;

        info!(
            sale_id = %sale_id,
            items = items.len(),
            reason = reason.unwrap_or("N/A"),
            "Sale reversed, stock restored"
        );

        self.get_with_items(sale_id).await
    }

    // -------------------------------------------------------------------------
    // Deletion (exceptional)
    // -------------------------------------------------------------------------

    /// Physically deletes a sale, restoring stock for every item.
    ///
    /// Deletion is an exceptional compensating event, always logged at high
    /// severity. The item tuples are captured before removal; after the
    /// cascade delete, one `return` entry per tuple references
    /// `DELETE-<sale-id>`.
    ///
    /// A sale that was already reversed deletes without compensation - its
    /// stock was restored by the reversal.
    pub async fn delete_sale(&self, sale_id: &str, actor: Option<&str>) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let sale = fetch_sale(&mut tx, sale_id).await?;

        // Capture {product, quantity, unit_price} before removal
        let mut items = sqlx::query_as::<_, SaleItem>(&format!(
            "{ITEM_SELECT} WHERE sale_id = ?1 ORDER BY created_at, id"
        ))
        .bind(sale_id)
        .fetch_all(&mut *tx)
        .await?;
        items.sort_by(|a, b| a.product_id.cmp(&b.product_id));

        error!(
            sale_id = %sale_id,
            items = items.len(),
            was_reversed = sale.is_reversed,
            "SALE DELETED: exceptional compensating event; this should not happen in normal operations"
        );

        // Items cascade with the sale row
        sqlx::query("DELETE FROM sales WHERE id = ?1")
            .bind(sale_id)
            .execute(&mut *tx)
            .await?;

        if sale.is_reversed {
            warn!(sale_id = %sale_id, "Deleted sale was already reversed; stock not restored twice");
        } else {
            for item in &items {
                apply_movement(
                    &mut tx,
                    &self.policy,
                    &item.product_id,
                    Movement::new(item.quantity, EntryKind::Return, item.unit_price_cents)
                        .with_reference(format!("DELETE-{}", sale_id))
                        .with_notes(format!("Stock restored from deleted sale {}", sale_id))
                        .with_actor(actor.unwrap_or_default()),
                )
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    /// Deletes a single sale item, restoring its stock and recomputing the
    /// parent sale's totals from the remaining items.
    ///
    /// Items of a reversed sale cannot be deleted - their stock was already
    /// restored by the reversal.
    pub async fn delete_sale_item(&self, item_id: &str, actor: Option<&str>) -> DbResult<Sale> {
        let mut tx = self.pool.begin().await?;

        let item = sqlx::query_as::<_, SaleItem>(&format!("{ITEM_SELECT} WHERE id = ?1"))
            .bind(item_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("SaleItem", item_id))?;

        let sale = fetch_sale(&mut tx, &item.sale_id).await?;
        if sale.is_reversed {
            return Err(StockError::InvalidMovement {
                code: item.product_code_snapshot.clone(),
                reason: "cannot delete an item from a reversed sale; its stock was already restored"
                    .to_string(),
            }
            .into());
        }

        warn!(
            item_id = %item_id,
            sale_id = %item.sale_id,
            product = %item.product_code_snapshot,
            quantity = item.quantity,
            "Sale item deleted; restoring stock"
        );

        apply_movement(
            &mut tx,
            &self.policy,
            &item.product_id,
            Movement::new(item.quantity, EntryKind::Return, item.unit_price_cents)
                .with_reference(format!("ITEM-DELETE-{}", item_id))
                .with_notes("Stock restored from deleted sale item")
                .with_actor(actor.unwrap_or_default()),
        )
        .await?;

        sqlx::query("DELETE FROM sale_items WHERE id = ?1")
            .bind(item_id)
            .execute(&mut *tx)
            .await?;

        // Recompute parent totals from the remaining items
        let now = Utc::now();
        sqlx::query(
            r#"
            UPDATE sales
            SET total_quantity = (SELECT COALESCE(SUM(quantity), 0) FROM sale_items WHERE sale_id = ?1),
                subtotal_cents = (SELECT COALESCE(SUM(total_price_cents), 0) FROM sale_items WHERE sale_id = ?1),
                total_cents = tax_cents + (SELECT COALESCE(SUM(total_price_cents), 0) FROM sale_items WHERE sale_id = ?1),
                updated_at = ?2
            WHERE id = ?1
            "#,
        )
        .bind(&item.sale_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let sale = fetch_sale(&mut tx, &item.sale_id).await?;
        if sale.total_quantity == 0 {
            warn!(sale_id = %sale.id, "Sale has no remaining items; consider deleting the sale");
        }

        tx.commit().await?;
        Ok(sale)
    }
}

// =============================================================================
// Helpers
// =============================================================================

async fn fetch_sale(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<Sale> {
    let sale = sqlx::query_as::<_, Sale>(&format!("{SALE_SELECT} WHERE id = ?1"))
        .bind(sale_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Sale", sale_id))?;

    Ok(sale)
}

async fn fetch_sale_pool(pool: &SqlitePool, sale_id: &str) -> DbResult<Sale> {
    let sale = sqlx::query_as::<_, Sale>(&format!("{SALE_SELECT} WHERE id = ?1"))
        .bind(sale_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DbError::not_found("Sale", sale_id))?;

    Ok(sale)
}

async fn insert_sale(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO sales (
            id, seller_id, buyer_name, buyer_phone, buyer_id_number,
            total_quantity, subtotal_cents, tax_cents, total_cents,
            is_reversed, reversed_at, reversed_by, reversal_reason,
            receipt_number, receipt_counter, receipt_processed_at,
            created_at, updated_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5,
            ?6, ?7, ?8, ?9,
            ?10, ?11, ?12, ?13,
            ?14, ?15, ?16,
            ?17, ?18
        )
        "#,
    )
    .bind(&sale.id)
    .bind(&sale.seller_id)
    .bind(&sale.buyer_name)
    .bind(&sale.buyer_phone)
    .bind(&sale.buyer_id_number)
    .bind(sale.total_quantity)
    .bind(sale.subtotal_cents)
    .bind(sale.tax_cents)
    .bind(sale.total_cents)
    .bind(sale.is_reversed)
    .bind(sale.reversed_at)
    .bind(&sale.reversed_by)
    .bind(&sale.reversal_reason)
    .bind(&sale.receipt_number)
    .bind(sale.receipt_counter)
    .bind(sale.receipt_processed_at)
    .bind(sale.created_at)
    .bind(sale.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn insert_item(conn: &mut SqliteConnection, item: &SaleItem) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO sale_items (
            id, sale_id, product_id,
            product_code_snapshot, product_name_snapshot, sku_snapshot,
            quantity, unit_price_cents, total_price_cents, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&item.id)
    .bind(&item.sale_id)
    .bind(&item.product_id)
    .bind(&item.product_code_snapshot)
    .bind(&item.product_name_snapshot)
    .bind(&item.sku_snapshot)
    .bind(item.quantity)
    .bind(item.unit_price_cents)
    .bind(item.total_price_cents)
    .bind(item.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::testutil::{bulk_product, single_product, test_category, test_db};
    use stockline_core::{ItemKind, ProductStatus};

    fn one_line(product_id: &str, quantity: i64) -> CheckoutRequest {
        CheckoutRequest {
            seller_id: "operator-1".into(),
            buyer: BuyerDetails::default(),
            lines: vec![CheckoutLine {
                product_id: product_id.into(),
                quantity,
                unit_price_cents: None,
            }],
            tax_cents: 0,
        }
    }

    // -------------------------------------------------------------------------
    // Checkout
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_single_item_checkout_and_reversal_scenario() {
        // Category Phones (single, sku=IMEI); product "S24" with IMEI:123
        let db = test_db().await;
        let cat = test_category(&db, "Phones", ItemKind::Single).await;
        let product = single_product(&db, &cat.id, "S24", "IMEI:123", 50_000).await;
        assert_eq!(product.quantity, 1);
        assert_eq!(product.status, ProductStatus::Available);

        // Checkout 1 unit → quantity 0, status sold, sale entry delta -1
        let sale = db.sales().checkout(one_line(&product.id, 1)).await.unwrap();
        let product_after = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(product_after.quantity, 0);
        assert_eq!(product_after.status, ProductStatus::Sold);

        let entries = db.ledger().entries_for_product(&product.id, 10).await.unwrap();
        let sale_entry = entries.iter().find(|e| e.kind == EntryKind::Sale).unwrap();
        assert_eq!(sale_entry.delta, -1);

        // Snapshots captured at sale time
        assert_eq!(sale.items[0].product_code_snapshot, product.code);
        assert_eq!(sale.items[0].sku_snapshot.as_deref(), Some("IMEI:123"));

        // Reverse → quantity 1, status available, return entry +1 with
        // REVERSE-<id> reference
        let reversed = db
            .sales()
            .reverse_sale(&sale.sale.id, Some("customer return"), "admin")
            .await
            .unwrap();
        assert!(reversed.sale.is_reversed);

        let product_restored = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(product_restored.quantity, 1);
        assert_eq!(product_restored.status, ProductStatus::Available);

        let entries = db.ledger().entries_for_product(&product.id, 10).await.unwrap();
        let return_entry = entries.iter().find(|e| e.kind == EntryKind::Return).unwrap();
        assert_eq!(return_entry.delta, 1);
        assert_eq!(
            return_entry.reference.as_deref(),
            Some(format!("REVERSE-{}", sale.sale.id).as_str())
        );

        assert_eq!(db.ledger().ledger_sum(&product.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_bulk_checkout_scenario() {
        // Product purchased +10 → sale of 7 → lowstock → sale of 5 fails
        let db = test_db().await;
        let cat = test_category(&db, "Cables", ItemKind::Bulk).await;
        let product = bulk_product(&db, &cat.id, "USB-C", 10, 2500).await;
        assert_eq!(product.status, ProductStatus::Available);

        db.sales().checkout(one_line(&product.id, 7)).await.unwrap();
        let product_after = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(product_after.quantity, 3);
        assert_eq!(product_after.status, ProductStatus::LowStock);

        let err = db.sales().checkout(one_line(&product.id, 5)).await.unwrap_err();
        match err {
            DbError::Domain(StockError::InsufficientStock {
                available,
                requested,
                ..
            }) => {
                assert_eq!(available, 3);
                assert_eq!(requested, 5);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }

        // Failed checkout left nothing behind
        let product_after = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(product_after.quantity, 3);
        assert_eq!(db.ledger().ledger_sum(&product.id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_checkout_totals_and_tax() {
        let db = test_db().await;
        let cat = test_category(&db, "Cables", ItemKind::Bulk).await;
        let a = bulk_product(&db, &cat.id, "USB-C", 10, 2500).await;
        let b = bulk_product(&db, &cat.id, "HDMI", 10, 3000).await;

        let sale = db
            .sales()
            .checkout(CheckoutRequest {
                seller_id: "operator-1".into(),
                buyer: BuyerDetails {
                    name: Some("Jane".into()),
                    ..BuyerDetails::default()
                },
                lines: vec![
                    CheckoutLine {
                        product_id: a.id.clone(),
                        quantity: 2,
                        unit_price_cents: Some(4000),
                    },
                    CheckoutLine {
                        product_id: b.id.clone(),
                        quantity: 1,
                        unit_price_cents: Some(5000),
                    },
                ],
                tax_cents: 2080,
            })
            .await
            .unwrap();

        assert_eq!(sale.sale.total_quantity, 3);
        assert_eq!(sale.sale.subtotal_cents, 13_000);
        assert_eq!(sale.sale.tax_cents, 2080);
        assert_eq!(sale.sale.total_cents, 15_080);
        assert_eq!(sale.items.len(), 2);
    }

    #[tokio::test]
    async fn test_multi_line_checkout_is_all_or_nothing() {
        let db = test_db().await;
        let cat = test_category(&db, "Cables", ItemKind::Bulk).await;
        let plenty = bulk_product(&db, &cat.id, "USB-C", 10, 2500).await;
        let scarce = bulk_product(&db, &cat.id, "HDMI", 1, 3000).await;

        let err = db
            .sales()
            .checkout(CheckoutRequest {
                seller_id: "operator-1".into(),
                buyer: BuyerDetails::default(),
                lines: vec![
                    CheckoutLine {
                        product_id: plenty.id.clone(),
                        quantity: 5,
                        unit_price_cents: None,
                    },
                    CheckoutLine {
                        product_id: scarce.id.clone(),
                        quantity: 3,
                        unit_price_cents: None,
                    },
                ],
                tax_cents: 0,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(StockError::InsufficientStock { .. })
        ));

        // The successful line rolled back with the failed one
        let plenty_after = db.products().get_by_id(&plenty.id).await.unwrap().unwrap();
        assert_eq!(plenty_after.quantity, 10);
        assert_eq!(db.ledger().ledger_sum(&plenty.id).await.unwrap(), 10);
        assert_eq!(db.sales().list_recent(10).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_empty_checkout_is_rejected() {
        let db = test_db().await;
        let err = db
            .sales()
            .checkout(CheckoutRequest {
                seller_id: "operator-1".into(),
                buyer: BuyerDetails::default(),
                lines: vec![],
                tax_cents: 0,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(StockError::Validation(_))));
    }

    // -------------------------------------------------------------------------
    // Reversal
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_reversal_is_idempotent() {
        let db = test_db().await;
        let cat = test_category(&db, "Cables", ItemKind::Bulk).await;
        let product = bulk_product(&db, &cat.id, "USB-C", 10, 2500).await;

        let sale = db.sales().checkout(one_line(&product.id, 4)).await.unwrap();

        db.sales()
            .reverse_sale(&sale.sale.id, Some("wrong item"), "admin")
            .await
            .unwrap();
        let after_first = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(after_first.quantity, 10);

        // Second reversal: no duplicate entries, no quantity drift
        db.sales()
            .reverse_sale(&sale.sale.id, Some("wrong item"), "admin")
            .await
            .unwrap();
        let after_second = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(after_second.quantity, 10);

        let returns: Vec<_> = db
            .ledger()
            .entries_for_product(&product.id, 50)
            .await
            .unwrap()
            .into_iter()
            .filter(|e| e.kind == EntryKind::Return)
            .collect();
        assert_eq!(returns.len(), 1);
    }

    #[tokio::test]
    async fn test_reversal_and_deletion_are_equivalent() {
        let db = test_db().await;
        let cat = test_category(&db, "Cables", ItemKind::Bulk).await;
        let reversed = bulk_product(&db, &cat.id, "USB-C", 10, 2500).await;
        let deleted = bulk_product(&db, &cat.id, "HDMI", 10, 2500).await;

        let sale_a = db.sales().checkout(one_line(&reversed.id, 4)).await.unwrap();
        let sale_b = db.sales().checkout(one_line(&deleted.id, 4)).await.unwrap();

        db.sales()
            .reverse_sale(&sale_a.sale.id, None, "admin")
            .await
            .unwrap();
        db.sales().delete_sale(&sale_b.sale.id, None).await.unwrap();

        let a = db.products().get_by_id(&reversed.id).await.unwrap().unwrap();
        let b = db.products().get_by_id(&deleted.id).await.unwrap().unwrap();
        assert_eq!(a.quantity, b.quantity);
        assert_eq!(a.status, b.status);
        assert_eq!(
            db.ledger().ledger_sum(&reversed.id).await.unwrap(),
            db.ledger().ledger_sum(&deleted.id).await.unwrap()
        );
    }

    // -------------------------------------------------------------------------
    // Deletion
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_delete_sale_restores_stock_with_reference() {
        let db = test_db().await;
        let cat = test_category(&db, "Cables", ItemKind::Bulk).await;
        let product = bulk_product(&db, &cat.id, "USB-C", 10, 2500).await;

        let sale = db.sales().checkout(one_line(&product.id, 6)).await.unwrap();
        db.sales().delete_sale(&sale.sale.id, Some("admin")).await.unwrap();

        assert!(db.sales().get_by_id(&sale.sale.id).await.unwrap().is_none());

        let product_after = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(product_after.quantity, 10);

        let entries = db.ledger().entries_for_product(&product.id, 50).await.unwrap();
        let delete_entry = entries
            .iter()
            .find(|e| {
                e.reference.as_deref() == Some(format!("DELETE-{}", sale.sale.id).as_str())
            })
            .unwrap();
        assert_eq!(delete_entry.delta, 6);
        assert_eq!(delete_entry.kind, EntryKind::Return);
    }

    #[tokio::test]
    async fn test_delete_reversed_sale_does_not_restore_twice() {
        let db = test_db().await;
        let cat = test_category(&db, "Cables", ItemKind::Bulk).await;
        let product = bulk_product(&db, &cat.id, "USB-C", 10, 2500).await;

        let sale = db.sales().checkout(one_line(&product.id, 4)).await.unwrap();
        db.sales().reverse_sale(&sale.sale.id, None, "admin").await.unwrap();
        db.sales().delete_sale(&sale.sale.id, None).await.unwrap();

        let product_after = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(product_after.quantity, 10);
        assert_eq!(db.ledger().ledger_sum(&product.id).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_delete_sale_item_recomputes_totals() {
        let db = test_db().await;
        let cat = test_category(&db, "Cables", ItemKind::Bulk).await;
        let a = bulk_product(&db, &cat.id, "USB-C", 10, 2500).await;
        let b = bulk_product(&db, &cat.id, "HDMI", 10, 3000).await;

        let sale = db
            .sales()
            .checkout(CheckoutRequest {
                seller_id: "operator-1".into(),
                buyer: BuyerDetails::default(),
                lines: vec![
                    CheckoutLine {
                        product_id: a.id.clone(),
                        quantity: 2,
                        unit_price_cents: Some(4000),
                    },
                    CheckoutLine {
                        product_id: b.id.clone(),
                        quantity: 3,
                        unit_price_cents: Some(5000),
                    },
                ],
                tax_cents: 100,
            })
            .await
            .unwrap();

        let item_a = sale
            .items
            .iter()
            .find(|i| i.product_id == a.id)
            .unwrap()
            .clone();

        let updated = db
            .sales()
            .delete_sale_item(&item_a.id, Some("admin"))
            .await
            .unwrap();

        // Stock restored with an ITEM-DELETE reference
        let a_after = db.products().get_by_id(&a.id).await.unwrap().unwrap();
        assert_eq!(a_after.quantity, 10);
        let entries = db.ledger().entries_for_product(&a.id, 50).await.unwrap();
        assert!(entries.iter().any(|e| {
            e.reference.as_deref() == Some(format!("ITEM-DELETE-{}", item_a.id).as_str())
        }));

        // Totals recomputed from the remaining item
        assert_eq!(updated.total_quantity, 3);
        assert_eq!(updated.subtotal_cents, 15_000);
        assert_eq!(updated.total_cents, 15_100);
    }

    #[tokio::test]
    async fn test_delete_item_of_reversed_sale_is_rejected() {
        let db = test_db().await;
        let cat = test_category(&db, "Cables", ItemKind::Bulk).await;
        let product = bulk_product(&db, &cat.id, "USB-C", 10, 2500).await;

        let sale = db.sales().checkout(one_line(&product.id, 2)).await.unwrap();
        db.sales().reverse_sale(&sale.sale.id, None, "admin").await.unwrap();

        let err = db
            .sales()
            .delete_sale_item(&sale.items[0].id, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(StockError::InvalidMovement { .. })
        ));
    }

    // -------------------------------------------------------------------------
    // Receipt numbering
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_assign_receipt_is_idempotent_and_monotonic() {
        let db = test_db().await;
        let cat = test_category(&db, "Cables", ItemKind::Bulk).await;
        let product = bulk_product(&db, &cat.id, "USB-C", 10, 2500).await;

        let first = db.sales().checkout(one_line(&product.id, 1)).await.unwrap();
        let second = db.sales().checkout(one_line(&product.id, 1)).await.unwrap();

        let assigned = db.sales().assign_receipt(&first.sale.id).await.unwrap();
        assert_eq!(assigned.receipt_counter, Some(1));
        assert_eq!(assigned.receipt_number.as_deref(), Some("RCPT-000001"));
        assert!(assigned.receipt_processed_at.is_some());

        // Re-invocation is a no-op returning the assigned number
        let again = db.sales().assign_receipt(&first.sale.id).await.unwrap();
        assert_eq!(again.receipt_number, assigned.receipt_number);
        assert_eq!(again.receipt_counter, Some(1));

        // The counter moves on for the next sale
        let next = db.sales().assign_receipt(&second.sale.id).await.unwrap();
        assert_eq!(next.receipt_counter, Some(2));
        assert_eq!(next.receipt_number.as_deref(), Some("RCPT-000002"));
    }

    // -------------------------------------------------------------------------
    // Concurrency
    // -------------------------------------------------------------------------

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_checkouts_never_oversell() {
        // Two operators race for the last unit; exactly one wins
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stockline.db");
        let db = Database::new(DbConfig::new(&path).max_connections(4))
            .await
            .unwrap();

        let cat = test_category(&db, "Cables", ItemKind::Bulk).await;
        let product = bulk_product(&db, &cat.id, "USB-C", 1, 2500).await;

        let db_a = db.clone();
        let db_b = db.clone();
        let id_a = product.id.clone();
        let id_b = product.id.clone();

        let (a, b) = tokio::join!(
            tokio::spawn(async move { db_a.sales().checkout(one_line(&id_a, 1)).await }),
            tokio::spawn(async move { db_b.sales().checkout(one_line(&id_b, 1)).await }),
        );
        let results = [a.unwrap(), b.unwrap()];

        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1, "exactly one checkout must win the last unit");

        let failure = results.iter().find(|r| r.is_err()).unwrap();
        assert!(matches!(
            failure.as_ref().unwrap_err(),
            DbError::Domain(StockError::InsufficientStock { .. })
        ));

        let product_after = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(product_after.quantity, 0);
        assert_eq!(product_after.status, ProductStatus::OutOfStock);
        assert_eq!(db.ledger().ledger_sum(&product.id).await.unwrap(), 0);
    }
}
