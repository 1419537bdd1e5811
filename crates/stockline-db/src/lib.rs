//! # stockline-db: Database Layer for Stockline
//!
//! This crate provides persistence and the transactional protocols for the
//! Stockline inventory ledger. It uses SQLite for storage with sqlx for
//! async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stockline Data Flow                              │
//! │                                                                         │
//! │  Caller (HTTP handler / CLI command)                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   stockline-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ ledger/sale/  │    │  (embedded)  │  │   │
//! │  │   │               │    │ product/categ.│    │              │  │   │
//! │  │   │ SqlitePool    │◄───│               │    │ 001_init.sql │  │   │
//! │  │   │ StockPolicy   │    │ one txn per   │    │              │  │   │
//! │  │   │               │    │ protocol      │    │              │  │   │
//! │  │   └───────────────┘    └───────┬───────┘    └──────────────┘  │   │
//! │  │                                │                               │   │
//! │  │                                ▼                               │   │
//! │  │                    stockline-core::state::apply                │   │
//! │  │                    (invariants, pure, under lock)              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database (WAL, foreign keys, append-only ledger triggers)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (ledger, product, sale, category)
//!
//! ## Transaction Discipline
//!
//! Every stock-mutating operation (checkout, reversal, deletion, restock,
//! adjustment) runs in a single transaction that locks each affected product
//! (ascending product-id order) before reading its quantity, then performs
//! the ledger append and the product-state write together. A failure at any
//! point rolls the whole transaction back.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stockline_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/stockline.db")).await?;
//!
//! let sale = db.sales().checkout(request).await?;
//! db.sales().reverse_sale(&sale.sale.id, Some("customer return"), "admin").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::DbError;
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::category::{CategoryRepository, NewCategory};
pub use repository::ledger::{LedgerRepository, Movement};
pub use repository::product::{
    InventoryStats, NewProduct, ProductRepository, RestockRequest, TransferOutcome,
};
pub use repository::sale::{
    BuyerDetails, CheckoutLine, CheckoutRequest, SaleRepository,
};
