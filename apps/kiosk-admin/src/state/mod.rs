//! # State Module
//!
//! State shared by the admin commands.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    State Architecture                                   │
//! │                                                                         │
//! │  ┌──────────────────────────┐      ┌──────────────────────────────┐    │
//! │  │        DbState           │      │        ConfigState           │    │
//! │  │                          │      │                              │    │
//! │  │  Database (SQLite pool)  │      │  currency, markup            │    │
//! │  │                          │      │  payment link, admin emails  │    │
//! │  │                          │      │  stock policy                │    │
//! │  └──────────────────────────┘      └──────────────────────────────┘    │
//! │                                                                         │
//! │  Commands take `&DbState` and/or `&ConfigState`, nothing else.          │
//! │  • DbState: Database has internal connection pool (thread-safe)        │
//! │  • ConfigState: Read-only after initialization                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod db;

pub use config::{ConfigError, ConfigState, CONFIG_FILE_NAME, DATABASE_FILE_NAME};
pub use db::DbState;
