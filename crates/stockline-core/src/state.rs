//! # Stock State Engine
//!
//! Derives a product's quantity and status from a stock movement, enforcing
//! every per-category invariant in one deterministic place.
//!
//! ## The Transition Function
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    apply(code, kind, qty, delta, entry, policy)         │
//! │                                                                         │
//! │  SINGLE ITEM (quantity ∈ {0,1})                                        │
//! │  ├── stock-in  while qty=1  → CannotRestockSingleItem                  │
//! │  ├── stock-out while qty=0  → ProductNotAvailable                      │
//! │  ├── |delta| ≠ 1            → InvalidMovement                          │
//! │  └── ok → qty'∈{0,1}, status = qty'=1 ? available : sold               │
//! │                                                                         │
//! │  BULK ITEM (quantity ≥ 0)                                              │
//! │  ├── qty+delta < 0 and negative stock disallowed → InsufficientStock   │
//! │  └── ok → status by threshold:                                         │
//! │           qty' > threshold      → available                            │
//! │           0 < qty' ≤ threshold  → lowstock                             │
//! │           qty' ≤ 0              → outofstock                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The persistence layer calls [`apply`] for every ledger append while
//! holding the product's lock, so the transition it computes is exactly the
//! transition that commits. Checkout debits, reversal credits, deletion
//! credits, restocks, and manual adjustments all run through this function -
//! which is what makes reversal and deletion produce identical outcomes.

use serde::{Deserialize, Serialize};

use crate::error::{StockError, StockResult};
use crate::types::{EntryKind, ItemKind, ProductStatus};
use crate::DEFAULT_LOW_STOCK_THRESHOLD;

// =============================================================================
// Stock Policy
// =============================================================================

/// Deployment-level stock rules.
///
/// The low-stock threshold and the negative-stock allowance are policy
/// choices, not business law; both default to the conventional retail
/// values.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StockPolicy {
    /// A bulk product with `0 < quantity <= low_stock_threshold` reports
    /// `lowstock`.
    pub low_stock_threshold: i64,

    /// Whether a debit may drive a bulk product's quantity below zero.
    pub allow_negative_stock: bool,
}

impl Default for StockPolicy {
    fn default() -> Self {
        StockPolicy {
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
            allow_negative_stock: false,
        }
    }
}

// =============================================================================
// Transition
// =============================================================================

/// The result of applying a movement to a product's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// The new derived quantity.
    pub quantity: i64,
    /// The new derived status.
    pub status: ProductStatus,
}

// =============================================================================
// Status Derivation
// =============================================================================

/// Derives the status for a quantity under the given item kind.
///
/// Pure threshold logic; performs no floor checks. Use [`apply`] for
/// movements.
pub fn status_for(kind: ItemKind, quantity: i64, policy: &StockPolicy) -> ProductStatus {
    match kind {
        ItemKind::Single => {
            if quantity >= 1 {
                ProductStatus::Available
            } else {
                ProductStatus::Sold
            }
        }
        ItemKind::Bulk => {
            if quantity > policy.low_stock_threshold {
                ProductStatus::Available
            } else if quantity > 0 {
                ProductStatus::LowStock
            } else {
                ProductStatus::OutOfStock
            }
        }
    }
}

// =============================================================================
// Movement Application
// =============================================================================

/// Applies a signed quantity delta to a product's state.
///
/// ## Arguments
/// * `code` - Product business code, carried into error messages
/// * `kind` - The owning category's item kind
/// * `quantity` - Current derived quantity
/// * `delta` - Signed change; must be non-zero
/// * `entry` - The movement kind (affects which single-item rule fires)
/// * `policy` - Deployment stock policy
///
/// ## Errors
/// * [`StockError::InvalidMovement`] - zero delta, or a single item moved by
///   more than one unit
/// * [`StockError::CannotRestockSingleItem`] - stock-in against a stocked
///   single item
/// * [`StockError::ProductNotAvailable`] - stock-out against an empty single
///   item
/// * [`StockError::InsufficientStock`] - bulk debit below zero while the
///   policy disallows negative stock
pub fn apply(
    code: &str,
    kind: ItemKind,
    quantity: i64,
    delta: i64,
    entry: EntryKind,
    policy: &StockPolicy,
) -> StockResult<Transition> {
    if delta == 0 {
        return Err(StockError::InvalidMovement {
            code: code.to_string(),
            reason: "delta must be non-zero".to_string(),
        });
    }

    match kind {
        ItemKind::Single => apply_single(code, quantity, delta, entry),
        ItemKind::Bulk => apply_bulk(code, quantity, delta, policy),
    }
}

/// Single items move one unit at a time between {0,1}.
fn apply_single(
    code: &str,
    quantity: i64,
    delta: i64,
    entry: EntryKind,
) -> StockResult<Transition> {
    if delta.abs() != 1 {
        return Err(StockError::InvalidMovement {
            code: code.to_string(),
            reason: format!("single items move one unit at a time, got delta {delta}"),
        });
    }

    if delta > 0 {
        // Stock-in: only valid while the item is out of stock. A second
        // physical unit is a new product record, not a restock.
        if quantity >= 1 {
            return Err(StockError::CannotRestockSingleItem {
                code: code.to_string(),
            });
        }
    } else if quantity < 1 {
        // Stock-out: only valid while the item is on hand. A sale gets the
        // caller-facing availability error; any other debit of an empty
        // single item is malformed.
        return Err(match entry {
            EntryKind::Sale => StockError::ProductNotAvailable {
                code: code.to_string(),
                status: ProductStatus::Sold,
            },
            other => StockError::InvalidMovement {
                code: code.to_string(),
                reason: format!("{other} would drive a single item below zero"),
            },
        });
    }

    let new_quantity = quantity + delta;
    Ok(Transition {
        quantity: new_quantity,
        status: if new_quantity >= 1 {
            ProductStatus::Available
        } else {
            ProductStatus::Sold
        },
    })
}

/// Bulk items accumulate, floor-checked against the negative-stock policy.
fn apply_bulk(
    code: &str,
    quantity: i64,
    delta: i64,
    policy: &StockPolicy,
) -> StockResult<Transition> {
    let new_quantity = quantity + delta;

    if new_quantity < 0 && delta < 0 && !policy.allow_negative_stock {
        return Err(StockError::InsufficientStock {
            code: code.to_string(),
            available: quantity,
            requested: -delta,
        });
    }

    Ok(Transition {
        quantity: new_quantity,
        status: status_for(ItemKind::Bulk, new_quantity, policy),
    })
}

// =============================================================================
// Category-Kind Reconciliation
// =============================================================================

/// The outcome of re-evaluating a product under a new item kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciliation {
    /// The delta a reconciling adjustment entry must record.
    /// Zero when only the status changed.
    pub delta: i64,
    /// The quantity after reconciliation.
    pub quantity: i64,
    /// The status after reconciliation.
    pub status: ProductStatus,
}

impl Reconciliation {
    /// Whether the quantity was clamped (a ledger entry is required).
    #[inline]
    pub fn clamped(&self) -> bool {
        self.delta != 0
    }
}

/// Re-evaluates a product's quantity and status under a new item kind.
///
/// Switching to `single` forces the quantity into {0,1}; the returned delta
/// is what a reconciling `adjustment` ledger entry must carry so the
/// ledger-sum invariant survives the clamp. Switching to `bulk` keeps the
/// quantity and only re-derives the status under bulk thresholds.
pub fn reconcile(new_kind: ItemKind, quantity: i64, policy: &StockPolicy) -> Reconciliation {
    let new_quantity = match new_kind {
        ItemKind::Single => quantity.clamp(0, 1),
        ItemKind::Bulk => quantity,
    };

    Reconciliation {
        delta: new_quantity - quantity,
        quantity: new_quantity,
        status: status_for(new_kind, new_quantity, policy),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
