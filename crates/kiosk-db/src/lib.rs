//! # kiosk-db: Database Layer for the Kiosk
//!
//! Database access for the self-service kiosk and its admin tooling.
//! SQLite for storage, sqlx for async access.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Kiosk Data Flow                                │
//! │                                                                         │
//! │  kiosk-admin command (process_payment, send_invoice, ...)              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     kiosk-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │                │    │  (embedded)  │  │   │
//! │  │   │               │    │ Customer       │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ Product        │    │ 001_initial  │  │   │
//! │  │   │ WAL, FKs on   │    │ Transaction    │    │ _schema.sql  │  │   │
//! │  │   │               │    │ Request/Outbox │    │              │  │   │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (KIOSK_DB_PATH)                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kiosk_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("kiosk.db")).await?;
//!
//! let tx = db.transactions().checkout(&request, StockPolicy::Clamp).await?;
//! let balances = db.customers().list_with_balances().await?;
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

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::category::CategoryRepository;
pub use repository::customer::CustomerRepository;
pub use repository::outbox::NotificationOutboxRepository;
pub use repository::product::{ProductRepository, RestockRequest};
pub use repository::request::ProductRequestRepository;
pub use repository::transaction::{Settlement, TransactionRepository};
pub use repository::MAX_STOCK_ATTEMPTS;
