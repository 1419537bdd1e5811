//! # Stock Ledger Repository
//!
//! The append-only stock ledger and the single composition point every
//! stock-mutating protocol funnels through.
//!
//! ## The Movement Protocol
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │              apply_movement (inside one transaction)                    │
//! │                                                                         │
//! │  1. LOCK      UPDATE products SET updated_at = updated_at WHERE id=?   │
//! │               └── takes the write lock BEFORE any quantity read        │
//! │                                                                         │
//! │  2. READ      SELECT product + category kind (consistent under lock)   │
//! │                                                                         │
//! │  3. DERIVE    stockline_core::state::apply(...)                        │
//! │               └── pure transition; every invariant enforced here       │
//! │                                                                         │
//! │  4. WRITE     UPDATE products SET quantity = ?, status = ?             │
//! │               INSERT INTO stock_entries (delta, kind, ...)             │
//! │                                                                         │
//! │  COMMIT ← ledger append and state recompute land together or not      │
//! │           at all                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Checkout, reversal, deletion, restock, and manual adjustment are all
//! sequences of this one protocol, executed in ascending product-id order
//! when more than one product is involved. There are no side-effect hooks:
//! the consequence of a ledger append is an explicit, ordered call.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use stockline_core::state::{self, Reconciliation, StockPolicy};
use stockline_core::{EntryKind, ItemKind, Product, StockEntry};

use crate::error::{DbError, DbResult};
use crate::repository::product::PRODUCT_SELECT;

// =============================================================================
// Movement
// =============================================================================

/// A requested stock movement, before it becomes a ledger entry.
#[derive(Debug, Clone)]
pub struct Movement {
    /// Signed quantity delta. Must be non-zero.
    pub delta: i64,

    /// The movement kind.
    pub kind: EntryKind,

    /// Unit price in cents at the time of the movement.
    pub unit_price_cents: i64,

    /// Explicit total override in cents. When `None`, the total is
    /// `|delta| * unit_price`. Needed for zero-value records such as
    /// ownership transfers.
    pub total_override_cents: Option<i64>,

    /// Reference linking to the originating operation
    /// (`REVERSE-<sale-id>`, `DELETE-<sale-id>`, ...).
    pub reference: Option<String>,

    /// Free-text notes.
    pub notes: Option<String>,

    /// Actor recording the movement.
    pub actor: Option<String>,
}

impl Movement {
    /// Creates a movement with no reference, notes, or actor.
    pub fn new(delta: i64, kind: EntryKind, unit_price_cents: i64) -> Self {
        Movement {
            delta,
            kind,
            unit_price_cents,
            total_override_cents: None,
            reference: None,
            notes: None,
            actor: None,
        }
    }

    /// Sets the linking reference.
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// Sets the free-text notes.
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Sets the recording actor.
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Overrides the computed total amount.
    pub fn with_total_override(mut self, total_cents: i64) -> Self {
        self.total_override_cents = Some(total_cents);
        self
    }
}

// =============================================================================
// Transaction-Scoped Protocol
// =============================================================================
// These free functions run on a borrowed connection inside an open
// transaction, so multi-product operations (checkout, reversal) compose them
// under one commit.

/// Takes the write lock and reads the product's current state.
///
/// The no-op self-assignment is a write statement, so SQLite grants the
/// transaction its write lock here - before the quantity is read. Concurrent
/// writers queue on the busy-timeout; expiry surfaces as
/// `ConcurrencyTimeout`. Callers touching several products must call this in
/// ascending product-id order.
pub(crate) async fn lock_and_fetch(
    conn: &mut SqliteConnection,
    product_id: &str,
) -> DbResult<Product> {
    let locked = sqlx::query("UPDATE products SET updated_at = updated_at WHERE id = ?1")
        .bind(product_id)
        .execute(&mut *conn)
        .await?;

    if locked.rows_affected() == 0 {
        return Err(DbError::not_found("Product", product_id));
    }

    let product = sqlx::query_as::<_, Product>(&format!("{PRODUCT_SELECT} WHERE p.id = ?1"))
        .bind(product_id)
        .fetch_one(&mut *conn)
        .await?;

    Ok(product)
}

/// Applies a movement to a product that is already locked in this
/// transaction.
///
/// Runs the pure state transition, writes the derived quantity/status, and
/// appends the ledger entry - one atomic unit of work with the caller's
/// transaction.
pub(crate) async fn apply_to_locked(
    conn: &mut SqliteConnection,
    policy: &StockPolicy,
    product: &Product,
    movement: Movement,
) -> DbResult<StockEntry> {
    let transition = state::apply(
        &product.code,
        product.item_kind,
        product.quantity,
        movement.delta,
        movement.kind,
        policy,
    )?;

    let now = Utc::now();

    sqlx::query("UPDATE products SET quantity = ?2, status = ?3, updated_at = ?4 WHERE id = ?1")
        .bind(&product.id)
        .bind(transition.quantity)
        .bind(transition.status)
        .bind(now)
        .execute(&mut *conn)
        .await?;

    if transition.quantity < 0 {
        // Only reachable when the deployment enables negative stock; this
        // warning is the audit trail for it.
        warn!(
            code = %product.code,
            quantity = transition.quantity,
            "NEGATIVE STOCK: product has negative quantity"
        );
    }

    let entry = StockEntry {
        id: Uuid::new_v4().to_string(),
        product_id: product.id.clone(),
        delta: movement.delta,
        kind: movement.kind,
        unit_price_cents: movement.unit_price_cents,
        total_amount_cents: movement
            .total_override_cents
            .unwrap_or(movement.delta.abs() * movement.unit_price_cents),
        reference: movement.reference,
        notes: movement.notes,
        created_by: movement.actor.filter(|a| !a.is_empty()),
        created_at: now,
    };

    insert_entry(conn, &entry).await?;

    info!(
        direction = if entry.delta > 0 { "IN" } else { "OUT" },
        kind = %entry.kind,
        product = %product.code,
        delta = entry.delta,
        new_stock = transition.quantity,
        new_status = %transition.status,
        reference = entry.reference.as_deref().unwrap_or("N/A"),
        "Stock movement recorded"
    );

    Ok(entry)
}

/// Locks a product, then applies a movement to it.
///
/// Convenience for single-product operations; multi-product callers lock
/// everything first (ascending id order) and use [`apply_to_locked`].
pub(crate) async fn apply_movement(
    conn: &mut SqliteConnection,
    policy: &StockPolicy,
    product_id: &str,
    movement: Movement,
) -> DbResult<StockEntry> {
    let product = lock_and_fetch(conn, product_id).await?;
    apply_to_locked(conn, policy, &product, movement).await
}

/// Re-derives a locked product's state under a new item kind.
///
/// The normal movement rules don't apply here: a category-kind change is an
/// administrative reconciliation, not a stock movement. Switching to
/// `single` may clamp the quantity, and the clamp delta is recorded as an
/// `adjustment` entry so the ledger-sum invariant survives it. The clamp is
/// logged as a warning, never an error.
pub(crate) async fn apply_reconciliation(
    conn: &mut SqliteConnection,
    policy: &StockPolicy,
    product: &Product,
    new_kind: ItemKind,
    actor: Option<&str>,
) -> DbResult<Reconciliation> {
    let reconciliation = state::reconcile(new_kind, product.quantity, policy);
    let now = Utc::now();

    if reconciliation.clamped() {
        warn!(
            code = %product.code,
            old_quantity = product.quantity,
            new_quantity = reconciliation.quantity,
            new_kind = %new_kind,
            "RECONCILIATION: category kind change clamped product quantity"
        );

        sqlx::query(
            "UPDATE products SET quantity = ?2, status = ?3, updated_at = ?4 WHERE id = ?1",
        )
        .bind(&product.id)
        .bind(reconciliation.quantity)
        .bind(reconciliation.status)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        let entry = StockEntry {
            id: Uuid::new_v4().to_string(),
            product_id: product.id.clone(),
            delta: reconciliation.delta,
            kind: EntryKind::Adjustment,
            unit_price_cents: product.buying_price_cents,
            total_amount_cents: reconciliation.delta.abs() * product.buying_price_cents,
            reference: None,
            notes: Some(format!(
                "Category kind reconciliation: {} -> {}",
                product.quantity, reconciliation.quantity
            )),
            created_by: actor.filter(|a| !a.is_empty()).map(str::to_string),
            created_at: now,
        };
        insert_entry(conn, &entry).await?;
    } else if reconciliation.status != product.status {
        sqlx::query("UPDATE products SET status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(&product.id)
            .bind(reconciliation.status)
            .bind(now)
            .execute(&mut *conn)
            .await?;

        debug!(
            code = %product.code,
            old_status = %product.status,
            new_status = %reconciliation.status,
            "Status re-derived under new item kind"
        );
    }

    Ok(reconciliation)
}

/// Appends a ledger row. The only INSERT into `stock_entries` in the crate.
async fn insert_entry(conn: &mut SqliteConnection, entry: &StockEntry) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO stock_entries (
            id, product_id, delta, kind,
            unit_price_cents, total_amount_cents,
            reference, notes, created_by, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.product_id)
    .bind(entry.delta)
    .bind(entry.kind)
    .bind(entry.unit_price_cents)
    .bind(entry.total_amount_cents)
    .bind(&entry.reference)
    .bind(&entry.notes)
    .bind(&entry.created_by)
    .bind(entry.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

// =============================================================================
// Ledger Repository
// =============================================================================

/// Repository for stock ledger operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.ledger();
///
/// // Manual stock-in
/// let movement = Movement::new(10, EntryKind::Purchase, 2500)
///     .with_notes("restock from supplier")
///     .with_actor("admin");
/// repo.record_movement("product-uuid", movement).await?;
/// ```
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
    policy: StockPolicy,
}

impl LedgerRepository {
    /// Creates a new LedgerRepository.
    pub fn new(pool: SqlitePool, policy: StockPolicy) -> Self {
        LedgerRepository { pool, policy }
    }

    /// Records a single stock movement in its own transaction.
    ///
    /// This is the inbound `recordStockMovement` operation: manual
    /// adjustments, corrections, and one-off stock-ins from an admin
    /// surface.
    ///
    /// ## Errors
    /// Everything the state engine rejects (`InvalidMovement`,
    /// `InsufficientStock`, `CannotRestockSingleItem`, ...) plus
    /// `NotFound` for an unknown product.
    pub async fn record_movement(
        &self,
        product_id: &str,
        movement: Movement,
    ) -> DbResult<StockEntry> {
        debug!(product_id = %product_id, delta = movement.delta, kind = %movement.kind, "Recording stock movement");

        let mut tx = self.pool.begin().await?;
        let entry = apply_movement(&mut tx, &self.policy, product_id, movement).await?;
        tx.commit().await?;

        Ok(entry)
    }

    /// Gets the ledger entries for a product, newest first.
    pub async fn entries_for_product(
        &self,
        product_id: &str,
        limit: u32,
    ) -> DbResult<Vec<StockEntry>> {
        let entries = sqlx::query_as::<_, StockEntry>(
            r#"
            SELECT id, product_id, delta, kind,
                   unit_price_cents, total_amount_cents,
                   reference, notes, created_by, created_at
            FROM stock_entries
            WHERE product_id = ?1
            ORDER BY created_at DESC, id DESC
            LIMIT ?2
            "#,
        )
        .bind(product_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Gets recent ledger entries across all products, newest first,
    /// optionally filtered by movement kind.
    pub async fn list_recent(
        &self,
        kind: Option<EntryKind>,
        limit: u32,
    ) -> DbResult<Vec<StockEntry>> {
        let entries = match kind {
            Some(kind) => {
                sqlx::query_as::<_, StockEntry>(
                    r#"
                    SELECT id, product_id, delta, kind,
                           unit_price_cents, total_amount_cents,
                           reference, notes, created_by, created_at
                    FROM stock_entries
                    WHERE kind = ?1
                    ORDER BY created_at DESC, id DESC
                    LIMIT ?2
                    "#,
                )
                .bind(kind)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, StockEntry>(
                    r#"
                    SELECT id, product_id, delta, kind,
                           unit_price_cents, total_amount_cents,
                           reference, notes, created_by, created_at
                    FROM stock_entries
                    ORDER BY created_at DESC, id DESC
                    LIMIT ?1
                    "#,
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(entries)
    }

    /// Sums a product's ledger deltas.
    ///
    /// The core correctness invariant: this sum equals the product's derived
    /// quantity after every operation. Exposed for audits and tests.
    pub async fn ledger_sum(&self, product_id: &str) -> DbResult<i64> {
        let sum: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(delta), 0) FROM stock_entries WHERE product_id = ?1",
        )
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(sum)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
