//! # Repository Module
//!
//! Database repository implementations for the kiosk.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  kiosk-admin command                                                    │
//! │       │                                                                 │
//! │       │  db.transactions().checkout(&request, policy)                  │
//! │       ▼                                                                 │
//! │  TransactionRepository                                                 │
//! │  ├── checkout(&self, request, policy)                                  │
//! │  ├── mark_invoice_sent(&self, customer_id)                             │
//! │  └── sales_statistics(&self)                                           │
//! │       │                                                                 │
//! │       │  SQL (runtime-checked, bound parameters)                       │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CustomerRepository`](customer::CustomerRepository) - Customers and SQL-side balances
//! - [`CategoryRepository`](category::CategoryRepository) - Product categories
//! - [`ProductRepository`](product::ProductRepository) - Products, variants, restock
//! - [`TransactionRepository`](transaction::TransactionRepository) - Checkout, billing transitions, sales
//! - [`ProductRequestRepository`](request::ProductRequestRepository) - Out-of-stock requests
//! - [`NotificationOutboxRepository`](outbox::NotificationOutboxRepository) - Rendered messages awaiting delivery

use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::error::{DbError, DbResult};

pub mod category;
pub mod customer;
pub mod outbox;
pub mod product;
pub mod request;
pub mod transaction;

/// How many times a unit of work that lost a stock compare-and-swap is
/// retried before giving up with `DbError::StockConflict`.
pub const MAX_STOCK_ATTEMPTS: u32 = 5;

/// Decodes a decimal stored as TEXT.
pub(crate) fn decode_decimal(raw: &str, column: &str, id: &str) -> DbResult<Decimal> {
    Decimal::from_str(raw.trim()).map_err(|e| DbError::corrupt(column, id, e))
}

/// Encodes a decimal for a TEXT column, without trailing zeros.
pub(crate) fn encode_decimal(value: Decimal) -> String {
    value.normalize().to_string()
}

/// Outcome of one attempt at a compare-and-swap unit of work.
pub(crate) enum Attempt<T> {
    Done(T),
    /// Another writer changed this item's stock between read and write.
    Conflict(String),
}

/// Opens a write transaction that takes the SQLite write lock up front.
///
/// A deferred `BEGIN` under WAL fails with `SQLITE_BUSY` when it reads and
/// then tries to write after another writer committed. `BEGIN IMMEDIATE`
/// queues writers on `busy_timeout` instead, so they run one after another.
pub(crate) async fn begin_write(pool: &SqlitePool) -> DbResult<Transaction<'static, Sqlite>> {
    Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
