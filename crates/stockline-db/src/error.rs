//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← Adds context and categorization               │
//! │       │         │                                                       │
//! │       │         └── SQLITE_BUSY → StockError::ConcurrencyTimeout       │
//! │       ▼                                                                 │
//! │  Caller (HTTP handler / CLI) displays the precise reason               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use stockline_core::StockError;

/// Database operation errors.
///
/// Wraps sqlx errors with context and carries domain errors transparently,
/// so a caller matches on one type for both "the store failed" and "the
/// business rule fired".
#[derive(Debug, Error)]
pub enum DbError {
    /// Business-rule failure surfaced from the stock engine.
    ///
    /// Lock-wait timeouts also land here as
    /// [`StockError::ConcurrencyTimeout`]: the operation rolled back cleanly
    /// and is safe to retry.
    #[error(transparent)]
    Domain(#[from] StockError),

    /// Entity not found in database.
    ///
    /// ## When This Occurs
    /// - `fetch_optional` returns no rows
    /// - ID doesn't exist
    /// - Soft-deleted record
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Inserting a duplicate SKU value or category name
    /// - Any UNIQUE index violation
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether this error is the retryable lock-wait timeout.
    pub fn is_concurrency_timeout(&self) -> bool {
        matches!(self, DbError::Domain(StockError::ConcurrencyTimeout))
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound            → DbError::NotFound
/// sqlx::Error::Database (busy/locked) → StockError::ConcurrencyTimeout
/// sqlx::Error::Database (constraint)  → UniqueViolation / ForeignKeyViolation
/// sqlx::Error::PoolTimedOut           → DbError::PoolExhausted
/// Other                               → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLITE_BUSY / SQLITE_LOCKED surface as "database is locked"
                // once the busy-timeout is exhausted. That is the bounded
                // lock wait of the concurrency guard - a clean, retryable
                // failure.
                if msg.contains("database is locked") || msg.contains("database table is locked") {
                    DbError::Domain(StockError::ConcurrencyTimeout)
                } else if msg.contains("UNIQUE constraint failed") {
                    // Parse the column name from the error message:
                    // "UNIQUE constraint failed: <table>.<column>"
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
