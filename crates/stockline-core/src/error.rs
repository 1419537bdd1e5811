//! # Error Types
//!
//! Domain-specific error types for stockline-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  stockline-core errors (this file)                                     │
//! │  ├── StockError       - Stock movement / invariant violations          │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  stockline-db errors (separate crate)                                  │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  Flow: ValidationError → StockError → DbError → Caller                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (product code, counts)
//! 3. Errors are enum variants, never String
//! 4. Each error variant maps to a user-facing message precise enough that
//!    the caller never has to re-derive the reason

use thiserror::Error;

use crate::types::ProductStatus;

// =============================================================================
// Stock Error
// =============================================================================

/// Stock movement and invariant errors.
///
/// Every variant except [`StockError::ConcurrencyTimeout`] represents a
/// business rule violation; all of them abort the enclosing transaction.
#[derive(Debug, Error)]
pub enum StockError {
    /// The movement itself is malformed (zero delta, wrong step size).
    ///
    /// ## When This Occurs
    /// - Appending a ledger entry with `delta == 0`
    /// - Moving a single-SKU item by more than one unit at a time
    #[error("Invalid stock movement for {code}: {reason}")]
    InvalidMovement { code: String, reason: String },

    /// A debit would drive a bulk product's quantity negative.
    ///
    /// ## When This Occurs
    /// - Selling more than the available stock while the negative-stock
    ///   policy is disabled (the default)
    ///
    /// ## User Workflow
    /// ```text
    /// Checkout (qty: 5)
    ///      │
    ///      ▼
    /// Locked read: available=3
    ///      │
    ///      ▼
    /// InsufficientStock { code: "ACC-1F2E3D4C", available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// UI shows: "only 3 units available"
    /// ```
    #[error("Insufficient stock for {code}: available {available}, requested {requested}")]
    InsufficientStock {
        code: String,
        available: i64,
        requested: i64,
    },

    /// A single-SKU item is not in `available` status.
    ///
    /// ## When This Occurs
    /// - Selling a single item that is already sold
    #[error("Product {code} is not available (status: {status})")]
    ProductNotAvailable { code: String, status: ProductStatus },

    /// A stock-in movement was attempted against an already-stocked single item.
    ///
    /// Single items are identified by one SKU (e.g. an IMEI); a second unit
    /// is a different physical item and must be a new product record.
    #[error("{code} is a single item and cannot be restocked; create a new product instead")]
    CannotRestockSingleItem { code: String },

    /// The store's lock wait was exceeded.
    ///
    /// The operation left no partial state behind and is safe to retry.
    #[error("Timed out waiting for a product lock; the operation is safe to retry")]
    ConcurrencyTimeout,

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Used for early validation before any locking or ledger work runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, bad SKU characters).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value (e.g., duplicate SKU among active products).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with StockError.
pub type StockResult<T> = Result<T, StockError>;

// =============================================================================
// Unit Tests
// =============================================================================
