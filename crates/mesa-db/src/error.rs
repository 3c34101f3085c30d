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
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BillingError (mesa-billing) ← PersistenceFailure / SchemaRejectedValue │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Web layer shows the message next to the form                          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    ///
    /// ## When This Occurs
    /// - `fetch_one` returns no rows
    /// - An UPDATE by id touched zero rows
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Second open ticket for the same order (partial unique index)
    /// - Duplicate table number
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// CHECK constraint violation.
    ///
    /// ## When This Occurs
    /// - `ck_tickets_payment_method`: the value is not in the deployed
    ///   payment-method domain (pending migration)
    /// - Stock would go negative
    #[error("Check constraint failed: {constraint}")]
    CheckViolation { constraint: String },

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file doesn't exist and can't be created
    /// - File permissions issue
    /// - Disk full
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// BEGIN / COMMIT / SAVEPOINT failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Database is locked by another writer past the busy timeout.
    #[error("Database busy: {0}")]
    Busy(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Settings could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

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

    /// Returns true if the named CHECK constraint rejected the write.
    pub fn is_check_violation(&self, constraint: &str) -> bool {
        matches!(self, DbError::CheckViolation { constraint: c } if c.contains(constraint))
    }

    /// Returns true if retrying the whole unit of work may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DbError::Busy(_) | DbError::PoolExhausted)
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
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

                // SQLite constraint messages:
                //   "UNIQUE constraint failed: <table>.<column>"
                //   "FOREIGN KEY constraint failed"
                //   "CHECK constraint failed: <name or expression>"
                if let Some(field) = msg.split("UNIQUE constraint failed: ").nth(1) {
                    DbError::UniqueViolation {
                        field: field.to_string(),
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if let Some(constraint) = msg.split("CHECK constraint failed: ").nth(1) {
                    DbError::CheckViolation {
                        constraint: constraint.to_string(),
                    }
                } else if msg.contains("database is locked") || msg.contains("database is busy") {
                    DbError::Busy(msg.to_string())
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_violation_matching() {
        let err = DbError::CheckViolation {
            constraint: "ck_tickets_payment_method".to_string(),
        };
        assert!(err.is_check_violation("ck_tickets_payment_method"));
        assert!(!err.is_check_violation("ck_tickets_tax_split"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_retryable() {
        assert!(DbError::Busy("database is locked".into()).is_retryable());
        assert!(DbError::PoolExhausted.is_retryable());
        assert!(!DbError::not_found("Ticket", "x").is_retryable());
    }
}
