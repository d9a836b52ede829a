//! Configuration loading and representation.

use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Process configuration, read from the environment (and `.env`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: String,
    pub database_url: Option<String>,
    pub use_persistent_stores: bool,
    pub database_max_connections: u32,
    /// Retry budget of the reference generator.
    pub reference_max_attempts: u32,
    /// Default threshold of the low-stock report.
    pub low_stock_threshold: Decimal,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            database_url: None,
            use_persistent_stores: false,
            database_max_connections: 10,
            reference_max_attempts: 5,
            low_stock_threshold: Decimal::from(5),
        }
    }
}

impl AppConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(err) = dotenvy::dotenv() {
            if !err.not_found() {
                tracing::warn!(error = %err, "failed to read .env file");
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            bind_addr: get("STOCKBOOK_BIND_ADDR").unwrap_or(defaults.bind_addr),
            database_url: get("DATABASE_URL"),
            use_persistent_stores: parse_or(
                "USE_PERSISTENT_STORES",
                get("USE_PERSISTENT_STORES"),
                defaults.use_persistent_stores,
            )?,
            database_max_connections: parse_or(
                "DATABASE_MAX_CONNECTIONS",
                get("DATABASE_MAX_CONNECTIONS"),
                defaults.database_max_connections,
            )?,
            reference_max_attempts: positive(
                "REFERENCE_MAX_ATTEMPTS",
                parse_or(
                    "REFERENCE_MAX_ATTEMPTS",
                    get("REFERENCE_MAX_ATTEMPTS"),
                    defaults.reference_max_attempts,
                )?,
            )?,
            low_stock_threshold: parse_or(
                "LOW_STOCK_THRESHOLD",
                get("LOW_STOCK_THRESHOLD"),
                defaults.low_stock_threshold,
            )?,
        })
    }
}

fn parse_or<T: core::str::FromStr>(
    key: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

fn positive(key: &'static str, value: u32) -> Result<u32, ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid { key, value: value.to_string() });
    }
    Ok(value)
}
