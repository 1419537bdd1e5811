//! # Repository Module
//!
//! Database repository implementations for Stockline.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern Explained                         │
//! │                                                                         │
//! │  The Repository pattern abstracts database access behind a clean API.  │
//! │                                                                         │
//! │  Caller                                                                │
//! │       │                                                                 │
//! │       │  db.sales().checkout(request)                                  │
//! │       │  ↓                                                              │
//! │       ▼                                                                 │
//! │  SaleRepository                                                        │
//! │  ├── checkout(&self, request)                                          │
//! │  ├── reverse_sale(&self, id, reason, actor)                            │
//! │  ├── delete_sale(&self, id, actor)                                     │
//! │  └── assign_receipt(&self, id)                                         │
//! │       │                                                                 │
//! │       │  One transaction: lock products → ledger append → state write  │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ledger::LedgerRepository`] - Stock ledger appends and listings
//! - [`product::ProductRepository`] - Product lifecycle, restock, transfer
//! - [`sale::SaleRepository`] - Checkout, reversal, deletion, receipts
//! - [`category::CategoryRepository`] - Categories and kind reconciliation

pub mod category;
pub mod ledger;
pub mod product;
pub mod sale;

#[cfg(test)]
pub(crate) mod testutil;
