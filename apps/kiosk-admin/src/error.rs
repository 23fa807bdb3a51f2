//! # API Error Type
//!
//! Unified error type for admin commands.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in the Kiosk Admin                        │
//! │                                                                         │
//! │  Command Function → Result<T, ApiError>                                 │
//! │         │                                                               │
//! │         ├── DbError::NotFound ────────────────► NOT_FOUND               │
//! │         ├── DbError::StockConflict ───────────► CONFLICT                │
//! │         ├── DbError::QueryFailed, ... ─ logged ► DATABASE_ERROR         │
//! │         ├── CoreError::InsufficientStock ─────► INSUFFICIENT_STOCK      │
//! │         ├── CoreError::Validation ────────────► VALIDATION_ERROR        │
//! │         └── ConfigError ──────────────────────► CONFIG_ERROR            │
//! │                                                                         │
//! │  Internal details are logged with tracing::error! and replaced by a    │
//! │  generic message; business errors pass their message through.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use kiosk_core::CoreError;
use kiosk_db::DbError;
use serde::Serialize;

use crate::state::ConfigError;

/// Error returned from admin commands.
///
/// ## Serialization
/// ```json
/// {
///   "code": "NOT_FOUND",
///   "message": "Customer not found: 5f0c..."
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Resource not found (404)
    NotFound,

    /// Input validation failed (400)
    ValidationError,

    /// Database operation failed (500)
    DatabaseError,

    /// Business rule rejected the request (422)
    BusinessLogic,

    /// Concurrent writers kept racing (409)
    Conflict,

    /// Insufficient stock
    InsufficientStock,

    /// Configuration could not be loaded
    ConfigError,

    /// Internal server error (500)
    Internal,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(
            ErrorCode::NotFound,
            format!("{} not found: {}", resource, id),
        )
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }
}

/// Business errors keep their message; everything else is logged here and
/// leaves as a generic `DATABASE_ERROR`.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::UniqueViolation { field, .. } => {
                ApiError::validation(format!("{} already exists", field))
            }
            DbError::ForeignKeyViolation { message } => {
                tracing::warn!(%message, "Delete blocked by a reference");
                ApiError::new(
                    ErrorCode::BusinessLogic,
                    "Record is still referenced (e.g. a customer with transactions)",
                )
            }
            e @ DbError::StockConflict { .. } => ApiError::new(ErrorCode::Conflict, e.to_string()),
            DbError::Domain(e) => e.into(),
            DbError::PoolExhausted => {
                tracing::error!("Database pool exhausted");
                ApiError::new(ErrorCode::DatabaseError, "Database is busy, try again")
            }
            other => {
                tracing::error!(error = %other, "Database operation failed");
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

/// Converts core errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::CustomerNotFound(id) => ApiError::not_found("Customer", &id),
            CoreError::ProductNotFound(id) => ApiError::not_found("Product", &id),
            CoreError::VariantNotFound(id) => ApiError::not_found("Variant", &id),
            e @ CoreError::InsufficientStock { .. } => {
                ApiError::new(ErrorCode::InsufficientStock, e.to_string())
            }
            e @ (CoreError::EmptyCart
            | CoreError::TotalMismatch { .. }
            | CoreError::AlreadyPaid(_)) => {
                ApiError::new(ErrorCode::BusinessLogic, e.to_string())
            }
            e @ CoreError::InvalidArgument { .. } => ApiError::validation(e.to_string()),
            CoreError::Validation(e) => ApiError::validation(e.to_string()),
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::new(ErrorCode::ConfigError, err.to_string())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}
