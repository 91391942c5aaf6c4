//! # Application Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     BOOKSTORE_DATABASE_PATH=./data/bookstore.db                        │
//! │     BOOKSTORE_ESEWA_SECRET_KEY=...                                     │
//! │     (a `.env` file in the working directory is loaded first)           │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ./bookstore.toml, or the path passed to AppConfig::load            │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     8% tax, free shipping from 50.00, eSewa sandbox                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # bookstore.toml
//! [database]
//! path = "./data/bookstore.db"
//! max_connections = 5
//!
//! [pricing]
//! tax_rate_bps = 800                 # 8%
//! free_shipping_threshold = 5000     # minor units (50.00)
//! flat_shipping_fee = 199            # minor units (1.99)
//!
//! [orders]
//! refund_window_days = 30
//!
//! [esewa]
//! merchant_code = "EPAYTEST"
//! secret_key = "8gBm/:&EnhH.1/q"
//! success_url = "https://shop.example/payment/esewa/success"
//! failure_url = "https://shop.example/payment/esewa/failure"
//!
//! [logging]
//! filter = "info,sqlx=warn"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};

use bookstore_core::lifecycle::REFUND_WINDOW_DAYS;
use bookstore_core::pricing::{
    DEFAULT_FLAT_SHIPPING_FEE, DEFAULT_FREE_SHIPPING_THRESHOLD, DEFAULT_TAX_RATE_BPS,
};
use bookstore_core::validation::validate_tax_rate_bps;
use bookstore_core::{Money, PricingConfig, TaxRate};
use bookstore_db::DbConfig;
use bookstore_payment::EsewaConfig;

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "bookstore.toml";

/// Prefix of every environment override.
pub const ENV_PREFIX: &str = "BOOKSTORE_";

// =============================================================================
// Errors
// =============================================================================

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// SQLite file, or `:memory:`.
    pub path: PathBuf,
    pub max_connections: u32,
    pub min_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: PathBuf::from("./data/bookstore.db"),
            max_connections: 5,
            min_connections: 1,
        }
    }
}

/// Pricing in plain numbers; see [`AppConfig::pricing`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingSettings {
    pub tax_rate_bps: u32,
    /// Minor units.
    pub free_shipping_threshold: i64,
    /// Minor units.
    pub flat_shipping_fee: i64,
}

impl Default for PricingSettings {
    fn default() -> Self {
        PricingSettings {
            tax_rate_bps: DEFAULT_TAX_RATE_BPS,
            free_shipping_threshold: DEFAULT_FREE_SHIPPING_THRESHOLD.minor(),
            flat_shipping_fee: DEFAULT_FLAT_SHIPPING_FEE.minor(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderSettings {
    pub refund_window_days: i64,
}

impl Default for OrderSettings {
    fn default() -> Self {
        OrderSettings {
            refund_window_days: REFUND_WINDOW_DAYS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive; `RUST_LOG` wins when set.
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            filter: "info".to_string(),
        }
    }
}

// =============================================================================
// AppConfig
// =============================================================================

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub pricing: PricingSettings,

    #[serde(default)]
    pub orders: OrderSettings,

    #[serde(default)]
    pub esewa: EsewaConfig,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl AppConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`path`, else `./bookstore.toml` if present)
    /// 3. `.env`, then `BOOKSTORE_*` environment variables
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => {
                debug!("No config file, using defaults");
                Self::default()
            }
        };

        if let Ok(env_file) = dotenvy::dotenv() {
            debug!(path = %env_file.display(), "Loaded .env");
        }

        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;

        Ok(config)
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        info!(path = %path.display(), "Loading config file");
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Applies `BOOKSTORE_*` overrides read through `var`.
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> ConfigResult<()> {
        let get = |suffix: &str| var(&format!("{ENV_PREFIX}{suffix}"));

        if let Some(path) = get("DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }
        if let Some(value) = get("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse("BOOKSTORE_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = get("TAX_RATE_BPS") {
            self.pricing.tax_rate_bps = parse("BOOKSTORE_TAX_RATE_BPS", &value)?;
        }
        if let Some(value) = get("FREE_SHIPPING_THRESHOLD") {
            self.pricing.free_shipping_threshold =
                parse("BOOKSTORE_FREE_SHIPPING_THRESHOLD", &value)?;
        }
        if let Some(value) = get("FLAT_SHIPPING_FEE") {
            self.pricing.flat_shipping_fee = parse("BOOKSTORE_FLAT_SHIPPING_FEE", &value)?;
        }
        if let Some(value) = get("REFUND_WINDOW_DAYS") {
            self.orders.refund_window_days = parse("BOOKSTORE_REFUND_WINDOW_DAYS", &value)?;
        }

        if let Some(code) = get("ESEWA_MERCHANT_CODE") {
            self.esewa.merchant_code = code;
        }
        if let Some(secret) = get("ESEWA_SECRET_KEY") {
            debug!("Overriding eSewa secret key from environment");
            self.esewa.secret_key = secret;
        }
        if let Some(url) = get("ESEWA_FORM_URL") {
            self.esewa.form_url = url;
        }
        if let Some(url) = get("ESEWA_STATUS_URL") {
            self.esewa.status_url = url;
        }
        if let Some(url) = get("ESEWA_SUCCESS_URL") {
            self.esewa.success_url = url;
        }
        if let Some(url) = get("ESEWA_FAILURE_URL") {
            self.esewa.failure_url = url;
        }
        if let Some(value) = get("ESEWA_TIMEOUT_SECS") {
            self.esewa.timeout_secs = parse("BOOKSTORE_ESEWA_TIMEOUT_SECS", &value)?;
        }

        if let Some(filter) = get("LOG") {
            self.logging.filter = filter;
        }

        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database.path is required".into()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }
        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Invalid(
                "database.min_connections exceeds max_connections".into(),
            ));
        }

        validate_tax_rate_bps(self.pricing.tax_rate_bps)
            .map_err(|e| ConfigError::Invalid(format!("pricing: {e}")))?;
        if self.pricing.free_shipping_threshold < 0 || self.pricing.flat_shipping_fee < 0 {
            return Err(ConfigError::Invalid("pricing amounts must not be negative".into()));
        }

        if self.orders.refund_window_days < 0 {
            return Err(ConfigError::Invalid(
                "orders.refund_window_days must not be negative".into(),
            ));
        }

        self.esewa
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        Ok(())
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn pricing(&self) -> PricingConfig {
        PricingConfig {
            tax_rate: TaxRate::from_bps(self.pricing.tax_rate_bps),
            free_shipping_threshold: Money::from_minor(self.pricing.free_shipping_threshold),
            flat_shipping_fee: Money::from_minor(self.pricing.flat_shipping_fee),
        }
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path)
            .max_connections(self.database.max_connections)
            .min_connections(self.database.min_connections)
    }

    /// Renders the configuration as TOML, e.g. to write a starter file.
    pub fn to_toml(&self) -> ConfigResult<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

fn parse<T: FromStr>(name: &str, value: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(name.to_string()))
}
