//! # Database State
//!
//! Wraps the `Database` connection for use in admin commands.
//!
//! ## Thread Safety
//! The `Database` struct from `kiosk-db` contains a `SqlitePool` which
//! is inherently thread-safe. Multiple commands can execute queries
//! concurrently without explicit locking.
//!
//! ## Usage in Commands
//! ```rust,ignore
//! pub async fn list_balances(db: &DbState) -> Result<Vec<CustomerBalance>, ApiError> {
//!     Ok(db.inner().customers().list_with_balances().await?)
//! }
//! ```

use kiosk_db::{Database, DbConfig};

use crate::error::ApiError;
use crate::state::ConfigState;

/// Wrapper around `Database` handed to every command.
#[derive(Debug, Clone)]
pub struct DbState {
    db: Database,
}

impl DbState {
    /// Creates a new DbState wrapping the database connection.
    pub fn new(db: Database) -> Self {
        DbState { db }
    }

    /// Opens the database configured in `config` and runs migrations.
    pub async fn open(config: &ConfigState) -> Result<Self, ApiError> {
        let path = config.resolve_database_path()?;
        let db = Database::new(DbConfig::new(path)).await?;
        Ok(DbState::new(db))
    }

    /// Returns a reference to the inner Database.
    pub fn inner(&self) -> &Database {
        &self.db
    }
}
