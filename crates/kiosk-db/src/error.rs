//! # Database Errors
//!
//! ```text
//! sqlx::Error ──┐
//!               ├──► DbError ──► ApiError (kiosk-admin)
//! CoreError ────┘    (Domain)
//! ```
//!
//! Constraint failures are classified with sqlx's portable
//! [`sqlx::error::ErrorKind`]. SQLite reports some foreign key failures
//! (RESTRICT on delete, deferred checks at commit) with the plain
//! `SQLITE_CONSTRAINT` code, which `ErrorKind` leaves as `Other`; those are
//! recognised by their message.

use kiosk_core::CoreError;
use sqlx::error::{DatabaseError, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    /// A referenced row does not exist (customer, product, variant, ...).
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// A delete or insert broke a foreign key, e.g. deleting a customer
    /// that still has transactions.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// The database rejected a statement for a reason other than a
    /// constraint (syntax, missing table, check constraint, ...).
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Stock changed under a checkout or restock on every retry.
    #[error("Stock for {item} kept changing; gave up after {attempts} attempts")]
    StockConflict { item: String, attempts: u32 },

    /// A stored value could not be decoded (e.g. a malformed decimal).
    #[error("Corrupt {column} in row {id}: {reason}")]
    CorruptRow {
        column: String,
        id: String,
        reason: String,
    },

    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("Internal database error: {0}")]
    Internal(String),

    /// A business rule rejected the operation.
    #[error(transparent)]
    Domain(#[from] CoreError),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn corrupt(column: impl Into<String>, id: impl Into<String>, reason: impl ToString) -> Self {
        DbError::CorruptRow {
            column: column.into(),
            id: id.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),

            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                match db_err.kind() {
                    ErrorKind::UniqueViolation => DbError::UniqueViolation {
                        // SQLite: "UNIQUE constraint failed: <table>.<column>"
                        field: message
                            .rsplit(": ")
                            .next()
                            .unwrap_or("unknown")
                            .to_string(),
                        value: "unknown".to_string(),
                    },
                    ErrorKind::ForeignKeyViolation => DbError::ForeignKeyViolation { message },
                    _ if is_foreign_key_failure(db_err.as_ref()) => {
                        DbError::ForeignKeyViolation { message }
                    }
                    _ => DbError::QueryFailed(message),
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool is closed".to_string()),

            other => DbError::Internal(other.to_string()),
        }
    }
}

/// SQLITE_CONSTRAINT (19) or SQLITE_CONSTRAINT_FOREIGNKEY (787) raised by
/// a foreign key check.
fn is_foreign_key_failure(err: &dyn DatabaseError) -> bool {
    let constraint = matches!(err.code().as_deref(), Some("19") | Some("787"));
    constraint && err.message().contains("FOREIGN KEY constraint failed")
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Internal(format!("JSON encoding failed: {}", err))
    }
}

pub type DbResult<T> = Result<T, DbError>;
