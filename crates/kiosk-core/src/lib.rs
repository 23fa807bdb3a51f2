//! # kiosk-core: Pure Business Logic for the Kiosk
//!
//! This crate holds the business rules of the kiosk as pure functions with
//! zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Kiosk Architecture                               │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Kiosk UI / Admin dashboard (external)              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 kiosk-admin (commands, config)                  │   │
//! │  │    process_payment, restock, send_invoice, settle_customer     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ kiosk-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │ repricing │  │  balance  │  │   sales   │  │   cart    │  │   │
//! │  │   │ weighted  │  │ outstand. │  │ per prod. │  │ checkout  │  │   │
//! │  │   │ avg cost  │  │ pending   │  │ per var.  │  │ stock pol.│  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    kiosk-db (Database Layer)                    │   │
//! │  │              SQLite queries, migrations, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Customer, Product, Transaction, etc.)
//! - [`money`] - Money type with integer arithmetic
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//! - [`repricing`] - Weighted-average repricing on restock
//! - [`balance`] - Customer balances and payment-state transitions
//! - [`sales`] - Sales statistics and dashboard figures
//! - [`cart`] - Cart math and checkout rules
//! - [`notification`] - Receipt / invoice / payment message rendering
//!
//! ## Example Usage
//!
//! ```rust
//! use kiosk_core::repricing::{reprice, StockBatch};
//! use rust_decimal::Decimal;
//!
//! let batch = StockBatch {
//!     current_stock: 10,
//!     current_purchase_price: Decimal::from(5),
//!     incoming_stock: 10,
//!     incoming_purchase_price: Some(Decimal::from(15)),
//!     markup_factor: Decimal::new(11, 1),
//! };
//!
//! let repriced = reprice(&batch).unwrap();
//! assert_eq!(repriced.stock, 20);
//! assert_eq!(repriced.purchase_price, Decimal::from(10));
//! assert_eq!(repriced.price.major(), 11);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod balance;
pub mod cart;
pub mod error;
pub mod money;
pub mod notification;
pub mod repricing;
pub mod sales;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use balance::BalanceSummary;
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use repricing::{RepricedStock, StockBatch, DEFAULT_MARKUP};
pub use sales::{ProductSales, SalesStatistics, SalesTotals, VariantSales};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed in a single cart.
pub const MAX_CART_LINES: usize = 100;

/// Maximum quantity of a single line in a cart.
///
/// ## Business Reason
/// Prevents accidental over-ordering at the kiosk (typing 100 instead of 1).
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Customer name recorded on guest checkouts.
pub const GUEST_CUSTOMER_NAME: &str = "Guest";
