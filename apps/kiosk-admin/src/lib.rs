//! # Kiosk Admin Library
//!
//! The application layer of the kiosk: the commands behind the kiosk
//! screens and the admin tools, their state and their error type.
//!
//! ## Module Organization
//! ```text
//! kiosk_admin/
//! ├── lib.rs          ◄─── You are here (exports, logging setup)
//! ├── state/
//! │   ├── mod.rs      ◄─── State type exports
//! │   ├── db.rs       ◄─── Database state wrapper
//! │   └── config.rs   ◄─── Configuration (TOML + KIOSK_* env)
//! ├── commands/
//! │   ├── mod.rs      ◄─── Command exports, notification queueing
//! │   ├── balance.rs  ◄─── Balances, invoices, settling
//! │   ├── checkout.rs ◄─── Customer and guest purchases
//! │   ├── inventory.rs◄─── Restock, price preview, sales report
//! │   ├── dashboard.rs◄─── Headline figures
//! │   └── request.rs  ◄─── Out-of-stock requests
//! └── error.rs        ◄─── API error type for commands
//! ```
//!
//! ## Startup Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. init_tracing()          RUST_LOG or "info,kiosk=debug,sqlx=warn"    │
//! │  2. ConfigState::load()     defaults ◄ kiosk.toml ◄ KIOSK_* env         │
//! │  3. DbState::open()         SQLite (WAL), migrations                    │
//! │  4. commands::*             one call per request                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod commands;
pub mod error;
pub mod state;

use tracing_subscriber::EnvFilter;

pub use error::{ApiError, ErrorCode};
pub use state::{ConfigState, DbState};

/// Default log filter when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "info,kiosk=debug,sqlx=warn";

/// Initializes the tracing subscriber.
///
/// Call once, from the binary. `RUST_LOG` overrides [`DEFAULT_LOG_FILTER`].
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
