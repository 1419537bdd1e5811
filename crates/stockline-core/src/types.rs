//! # Domain Types
//!
//! Core domain types used throughout Stockline.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Category     │   │    Product      │   │   StockEntry    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  item_kind      │◄──│  code (business)│◄──│  delta (signed) │       │
//! │  │  sku_kind       │   │  quantity       │   │  kind           │       │
//! │  └─────────────────┘   │  status         │   │  reference      │       │
//! │                        └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐                             │
//! │  │     Sale        │   │    SaleItem     │                             │
//! │  │  ─────────────  │   │  ─────────────  │                             │
//! │  │  totals         │──►│  snapshots      │                             │
//! │  │  is_reversed    │   │  quantity/price │                             │
//! │  │  receipt fields │   └─────────────────┘                             │
//! │  └─────────────────┘                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: (product code, SKU value, receipt number) - human-readable

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::money::Money;

// =============================================================================
// Item Kind
// =============================================================================

/// How a category tracks its stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    /// One unit identified by one SKU (e.g. a phone with an IMEI).
    /// Quantity is binary: in stock (1) or sold (0).
    Single,
    /// Fungible units tracked only by total count (e.g. cables).
    Bulk,
}

impl ItemKind {
    /// Returns the storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Single => "single",
            ItemKind::Bulk => "bulk",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// SKU Kind
// =============================================================================

/// What kind of identifier a category's SKU values carry.
///
/// Informational only: the engine treats SKU values as opaque strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum SkuKind {
    /// IMEI number (phones).
    Imei,
    /// Manufacturer serial number.
    Serial,
    /// Retail barcode (EAN/UPC).
    Barcode,
}

impl SkuKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkuKind::Imei => "imei",
            SkuKind::Serial => "serial",
            SkuKind::Barcode => "barcode",
        }
    }
}

impl fmt::Display for SkuKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Category
// =============================================================================

/// A product category.
///
/// The category's `item_kind` decides which stock invariants apply to every
/// product referencing it. Changing the kind of a category with existing
/// products is a reconciliation event, not a routine edit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Category {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name, unique.
    pub name: String,

    /// Generated short code, unique. Used as the product-code prefix.
    pub category_code: String,

    /// Single-SKU or bulk stock tracking.
    pub item_kind: ItemKind,

    /// What the SKU values of this category's products identify.
    pub sku_kind: SkuKind,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Category {
    /// Whether products of this category are unique single units.
    #[inline]
    pub fn is_single_item(&self) -> bool {
        self.item_kind == ItemKind::Single
    }

    /// Whether products of this category are fungible bulk units.
    #[inline]
    pub fn is_bulk_item(&self) -> bool {
        self.item_kind == ItemKind::Bulk
    }
}

// =============================================================================
// Product Status
// =============================================================================

/// The derived availability status of a product.
///
/// Status is a pure function of quantity and item kind; it is never set
/// directly by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    /// In stock. For bulk items: quantity above the low-stock threshold.
    Available,
    /// Single item with quantity 0.
    Sold,
    /// Bulk item with 0 < quantity <= threshold.
    LowStock,
    /// Bulk item with quantity <= 0.
    OutOfStock,
}

impl ProductStatus {
    /// Returns the storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Available => "available",
            ProductStatus::Sold => "sold",
            ProductStatus::LowStock => "lowstock",
            ProductStatus::OutOfStock => "outofstock",
        }
    }
}

impl fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Product
// =============================================================================

/// One inventory line.
///
/// `quantity` and `status` are derived projections of the product's stock
/// entries; they are only ever mutated through ledger-backed operations.
/// Products are never hard-deleted - `is_active` marks soft deletion so the
/// ledger's foreign keys stay intact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Generated business code (`<CATEGORY_CODE>-<8 hex>`), immutable, unique.
    pub code: String,

    /// Category this product belongs to.
    pub category_id: String,

    /// The owning category's item kind, joined in on every read.
    /// Not stored on the product row.
    pub item_kind: ItemKind,

    /// SKU value. Required and unique among active products for single
    /// categories; shared/informational for bulk.
    pub sku_value: Option<String>,

    /// Display name.
    pub name: String,

    /// Current stock level. Derived: equals the sum of this product's
    /// ledger deltas at all times.
    pub quantity: i64,

    /// Derived availability status.
    pub status: ProductStatus,

    /// Buying price in cents.
    pub buying_price_cents: i64,

    /// Selling price in cents.
    pub selling_price_cents: i64,

    /// Optional owning operator.
    pub owner_id: Option<String>,

    /// Soft-delete marker.
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the buying price as a Money type.
    #[inline]
    pub fn buying_price(&self) -> Money {
        Money::from_cents(self.buying_price_cents)
    }

    /// Returns the selling price as a Money type.
    #[inline]
    pub fn selling_price(&self) -> Money {
        Money::from_cents(self.selling_price_cents)
    }

    /// Total value of the stock on hand at buying price.
    #[inline]
    pub fn inventory_value(&self) -> Money {
        Money::from_cents(self.buying_price_cents.saturating_mul(self.quantity.max(0)))
    }

    /// Whether more stock can be added to this product.
    ///
    /// Single items hold at most one unit; bulk items always accept stock.
    pub fn can_restock(&self) -> bool {
        match self.item_kind {
            ItemKind::Single => self.quantity < 1,
            ItemKind::Bulk => true,
        }
    }
}

// =============================================================================
// Stock Entry (ledger record)
// =============================================================================

/// The kind of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Stock-in from a supplier or initial load.
    Purchase,
    /// Stock-out through a checkout.
    Sale,
    /// Compensating stock-in from a reversal or deletion.
    Return,
    /// Manual correction or transfer.
    Adjustment,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Purchase => "purchase",
            EntryKind::Sale => "sale",
            EntryKind::Return => "return",
            EntryKind::Adjustment => "adjustment",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable ledger record of a quantity change.
///
/// Entries are append-only: the only retraction mechanism is appending an
/// equal-and-opposite entry whose `reference` links to the original
/// (`REVERSE-<sale-id>`, `DELETE-<sale-id>`, `ITEM-DELETE-<item-id>`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockEntry {
    pub id: String,
    pub product_id: String,

    /// Signed quantity delta. Never zero.
    pub delta: i64,

    pub kind: EntryKind,

    /// Unit price in cents at the time of the movement.
    pub unit_price_cents: i64,

    /// Total amount in cents. `|delta| * unit_price` unless explicitly
    /// overridden (zero-value transfer records).
    pub total_amount_cents: i64,

    /// Free-text reference linking to the originating operation.
    pub reference: Option<String>,

    /// Free-text notes.
    pub notes: Option<String>,

    /// Actor who created the entry.
    pub created_by: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl StockEntry {
    /// Whether this entry added stock.
    #[inline]
    pub fn is_stock_in(&self) -> bool {
        self.delta > 0
    }

    /// Whether this entry removed stock.
    #[inline]
    pub fn is_stock_out(&self) -> bool {
        self.delta < 0
    }

    /// The unsigned moved quantity.
    #[inline]
    pub fn absolute_quantity(&self) -> i64 {
        self.delta.abs()
    }
}

// =============================================================================
// Sale
// =============================================================================

/// One checkout transaction.
///
/// Totals are derived from the sale's items at creation time. Reversal is a
/// one-way state transition (`is_reversed`), never a deletion; physical
/// deletion exists as an exceptional compensating operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    pub id: String,

    /// The operator who recorded the sale.
    pub seller_id: String,

    // Optional walk-in buyer details
    pub buyer_name: Option<String>,
    pub buyer_phone: Option<String>,
    pub buyer_id_number: Option<String>,

    /// Sum of item quantities.
    pub total_quantity: i64,

    /// Sum of item line totals in cents.
    pub subtotal_cents: i64,

    /// Tax in cents, supplied by the caller's tax policy.
    pub tax_cents: i64,

    /// `subtotal + tax` in cents.
    pub total_cents: i64,

    /// Reversal flag. One-way: once set it is never cleared.
    pub is_reversed: bool,
    pub reversed_at: Option<DateTime<Utc>>,
    pub reversed_by: Option<String>,
    pub reversal_reason: Option<String>,

    /// Fiscal receipt metadata, assigned at most once per sale.
    pub receipt_number: Option<String>,
    pub receipt_counter: Option<i64>,
    pub receipt_processed_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Sale {
    /// Returns the total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Whether a receipt number has already been assigned.
    #[inline]
    pub fn has_receipt(&self) -> bool {
        self.receipt_number.is_some()
    }
}

// =============================================================================
// Sale Item
// =============================================================================

/// A line item in a sale.
/// Uses snapshot pattern to freeze product data at time of sale, so later
/// catalog edits never alter historical receipts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,

    /// Product code at time of sale (frozen).
    pub product_code_snapshot: String,
    /// Product name at time of sale (frozen).
    pub product_name_snapshot: String,
    /// SKU value at time of sale (frozen).
    pub sku_snapshot: Option<String>,

    /// Quantity sold.
    pub quantity: i64,

    /// Unit price in cents at time of sale (frozen).
    pub unit_price_cents: i64,

    /// Line total in cents (unit_price × quantity).
    pub total_price_cents: i64,

    pub created_at: DateTime<Utc>,
}

impl SaleItem {
    /// Returns the unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Returns the line total as Money.
    #[inline]
    pub fn total_price(&self) -> Money {
        Money::from_cents(self.total_price_cents)
    }
}

// =============================================================================
// Sale + Items read model
// =============================================================================

/// Read-only view of a sale with its line items.
///
/// This is the structure handed to the fiscal-receipt collaborator after a
/// checkout succeeds; the engine records whatever identifiers that
/// collaborator returns but implements none of its protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleWithItems {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn product(kind: ItemKind, quantity: i64) -> Product {
        let now = Utc::now();
        Product {
            id: "p1".into(),
            code: "PHN-AB12CD34".into(),
            category_id: "c1".into(),
            item_kind: kind,
            sku_value: Some("IMEI:123".into()),
            name: "S24".into(),
            quantity,
            status: ProductStatus::Available,
            buying_price_cents: 50_000,
            selling_price_cents: 65_000,
            owner_id: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_single_item_can_restock_only_when_empty() {
        assert!(!product(ItemKind::Single, 1).can_restock());
        assert!(product(ItemKind::Single, 0).can_restock());
        assert!(product(ItemKind::Bulk, 100).can_restock());
    }

    #[test]
    fn test_inventory_value() {
        let p = product(ItemKind::Bulk, 3);
        assert_eq!(p.inventory_value().cents(), 150_000);
    }

    #[test]
    fn test_entry_direction_helpers() {
        let now = Utc::now();
        let entry = StockEntry {
            id: "e1".into(),
            product_id: "p1".into(),
            delta: -7,
            kind: EntryKind::Sale,
            unit_price_cents: 1000,
            total_amount_cents: 7000,
            reference: None,
            notes: None,
            created_by: None,
            created_at: now,
        };
        assert!(entry.is_stock_out());
        assert!(!entry.is_stock_in());
        assert_eq!(entry.absolute_quantity(), 7);
    }

    #[test]
    fn test_status_display_matches_storage() {
        assert_eq!(ProductStatus::LowStock.to_string(), "lowstock");
        assert_eq!(ProductStatus::OutOfStock.as_str(), "outofstock");
        assert_eq!(EntryKind::Return.as_str(), "return");
        assert_eq!(ItemKind::Single.as_str(), "single");
    }
}
