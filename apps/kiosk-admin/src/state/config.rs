//! # Configuration State
//!
//! Stores application configuration loaded at startup.
//!
//! ## Configuration Sources (Priority Order)
//! 1. Environment variables (`KIOSK_*`)
//! 2. Config file (`kiosk.toml`)
//! 3. Defaults (this file)
//!
//! ```toml
//! # kiosk.toml
//! database_path = "/var/lib/kiosk/kiosk.db"
//! currency_code = "USD"
//! currency_symbol = "$"
//! markup = "1.1"
//! payment_link = "https://pay.example/?amount={AMOUNT}"
//! admin_emails = ["admin@example.com"]
//! stock_policy = "clamp"
//! ```
//!
//! ## Thread Safety
//! Configuration is read-only after initialization, so no mutex needed.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use directories::ProjectDirs;
use kiosk_core::cart::StockPolicy;
use kiosk_core::{Money, DEFAULT_MARKUP};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Name of the config file inside the platform config directory.
pub const CONFIG_FILE_NAME: &str = "kiosk.toml";

/// Name of the database file inside the platform data directory.
pub const DATABASE_FILE_NAME: &str = "kiosk.db";

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {reason}")]
    Io { path: PathBuf, reason: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid {field}: {reason}")]
    Invalid { field: String, reason: String },

    #[error("Could not determine the platform data directory")]
    NoDataDir,
}

impl ConfigError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigState {
    /// SQLite file; `None` uses the platform data directory.
    pub database_path: Option<PathBuf>,

    /// Currency code (ISO 4217)
    pub currency_code: String,

    /// Currency symbol (for display)
    pub currency_symbol: String,

    /// Markup factor applied on restock (1.1 = +10%)
    pub markup: Decimal,

    /// Payment link template with an `{AMOUNT}` placeholder, put on invoices
    pub payment_link: Option<String>,

    /// Recipients of product request alerts
    pub admin_emails: Vec<String>,

    /// What checkout does when a line exceeds stock
    pub stock_policy: StockPolicy,
}

impl Default for ConfigState {
    /// Defaults suitable for development: USD, 10% markup, clamped stock,
    /// no payment link and no admin recipients.
    fn default() -> Self {
        ConfigState {
            database_path: None,
            currency_code: "USD".to_string(),
            currency_symbol: "$".to_string(),
            markup: DEFAULT_MARKUP,
            payment_link: None,
            admin_emails: Vec::new(),
            stock_policy: StockPolicy::Clamp,
        }
    }
}

impl ConfigState {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`config_path`, or `kiosk.toml` in the platform
    ///    config directory); a missing file is not an error
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = ConfigState::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                config = Self::from_file(&path)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    /// Parses a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parses TOML; missing keys keep their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Applies `KIOSK_*` overrides read through `lookup`.
    ///
    /// ## Variables
    /// - `KIOSK_DB_PATH`: database file
    /// - `KIOSK_CURRENCY`, `KIOSK_CURRENCY_SYMBOL`
    /// - `KIOSK_MARKUP`: decimal factor, e.g. `1.25`
    /// - `KIOSK_PAYMENT_LINK`: template with `{AMOUNT}`
    /// - `KIOSK_ADMIN_EMAILS`: `;`-separated list
    /// - `KIOSK_STOCK_POLICY`: `clamp` or `reject`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("KIOSK_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database_path = Some(PathBuf::from(path));
        }

        if let Some(code) = lookup("KIOSK_CURRENCY") {
            self.currency_code = code;
        }

        if let Some(symbol) = lookup("KIOSK_CURRENCY_SYMBOL") {
            self.currency_symbol = symbol;
        }

        if let Some(markup) = lookup("KIOSK_MARKUP") {
            self.markup = Decimal::from_str(markup.trim())
                .map_err(|e| ConfigError::invalid("KIOSK_MARKUP", e.to_string()))?;
        }

        if let Some(link) = lookup("KIOSK_PAYMENT_LINK") {
            let link = link.trim().to_string();
            self.payment_link = (!link.is_empty()).then_some(link);
        }

        if let Some(emails) = lookup("KIOSK_ADMIN_EMAILS") {
            self.admin_emails = split_emails(&emails);
        }

        if let Some(policy) = lookup("KIOSK_STOCK_POLICY") {
            self.stock_policy = policy
                .parse()
                .map_err(|e: kiosk_core::CoreError| ConfigError::invalid("KIOSK_STOCK_POLICY", e.to_string()))?;
        }

        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.markup <= Decimal::ZERO {
            return Err(ConfigError::invalid("markup", "must be greater than 0"));
        }

        if self.currency_code.trim().is_empty() {
            return Err(ConfigError::invalid("currency_code", "must not be empty"));
        }

        Ok(())
    }

    /// Resolves the database file, creating the platform data directory
    /// when no explicit path is configured.
    pub fn resolve_database_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.database_path {
            return Ok(path.clone());
        }

        let dirs = Self::project_dirs().ok_or(ConfigError::NoDataDir)?;
        let data_dir = dirs.data_dir();
        std::fs::create_dir_all(data_dir).map_err(|e| ConfigError::Io {
            path: data_dir.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(data_dir.join(DATABASE_FILE_NAME))
    }

    /// Formats an amount in whole major units, e.g. `$12`.
    pub fn format_amount(&self, amount: Money) -> String {
        amount.format_whole(&self.currency_symbol)
    }

    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("com", "kiosk", "kiosk")
    }

    fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }
}

/// Splits a `;`-separated recipient list, dropping blanks.
fn split_emails(raw: &str) -> Vec<String> {
    raw.split(';')
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(str::to_string)
        .collect()
}
