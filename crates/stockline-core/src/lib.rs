//! # stockline-core: Pure Business Logic for Stockline
//!
//! This crate is the **heart** of Stockline, an inventory ledger and
//! stock-consistency engine. It contains all business logic as pure
//! functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Stockline Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │               Callers (HTTP handlers, CLI commands)             │   │
//! │  │    create_product, checkout, reverse_sale, record_movement      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ stockline-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   state   │  │   money   │  │ validation│  │   │
//! │  │   │  Product  │  │ StockPol. │  │   Money   │  │   rules   │  │   │
//! │  │   │StockEntry │  │  apply()  │  │  (cents)  │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 stockline-db (Database Layer)                   │   │
//! │  │        SQLite queries, migrations, transactional protocols      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Category, Product, StockEntry, Sale, ...)
//! - [`state`] - Stock state transitions (the ledger's invariant engine)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in cents (i64) to avoid float errors
//! 4. **Explicit Errors**: All errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use stockline_core::state::{apply, StockPolicy};
//! use stockline_core::types::{EntryKind, ItemKind, ProductStatus};
//!
//! // Debit 7 units from a bulk product holding 10
//! let policy = StockPolicy::default();
//! let t = apply("USB-C", ItemKind::Bulk, 10, -7, EntryKind::Sale, &policy).unwrap();
//!
//! // 3 units remain, which is at or below the low-stock threshold of 5
//! assert_eq!(t.quantity, 3);
//! assert_eq!(t.status, ProductStatus::LowStock);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod state;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use stockline_core::Money` instead of
// `use stockline_core::money::Money`

pub use error::{StockError, StockResult, ValidationError};
pub use money::Money;
pub use state::{StockPolicy, Transition};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default low-stock threshold for bulk products.
///
/// A bulk product with `0 < quantity <= threshold` is reported as low stock.
/// Deployments override this through [`state::StockPolicy`].
pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 5;

/// Maximum line items allowed in a single checkout.
///
/// Prevents runaway transactions; a retail checkout never legitimately
/// carries more lines than this.
pub const MAX_SALE_LINES: usize = 100;

/// Maximum quantity of a single line item.
///
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10).
pub const MAX_LINE_QUANTITY: i64 = 999;
