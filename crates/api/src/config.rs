//! Application configuration loaded from environment variables.

use common::{BranchId, WarehouseId};
use thiserror::Error;

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid WAREHOUSES entry {0:?}, expected WAREHOUSE=BRANCH")]
    InvalidWarehouseEntry(String),
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT` — `json` for structured output, anything else for pretty
/// - `DATABASE_URL` — PostgreSQL connection string; in-memory store when unset
/// - `WAREHOUSES` — directory seed, `ALM-1=SUC-1,ALM-2=SUC-2`
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub warehouses: Vec<(WarehouseId, BranchId)>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: lookup("LOG_FORMAT")
                .map(|f| LogFormat::parse(&f))
                .unwrap_or_default(),
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            warehouses: match lookup("WAREHOUSES") {
                Some(raw) => parse_warehouses(&raw)?,
                None => Vec::new(),
            },
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            database_url: None,
            warehouses: Vec::new(),
        }
    }
}

/// Parses `ALM-1=SUC-1,ALM-2=SUC-2`. Blank segments are skipped.
pub fn parse_warehouses(raw: &str) -> Result<Vec<(WarehouseId, BranchId)>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (warehouse, branch) = entry
                .split_once('=')
                .map(|(w, b)| (w.trim(), b.trim()))
                .filter(|(w, b)| !w.is_empty() && !b.is_empty())
                .ok_or_else(|| ConfigError::InvalidWarehouseEntry(entry.to_string()))?;
            Ok((WarehouseId::new(warehouse), BranchId::new(branch)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_map(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.database_url.is_none());
        assert!(config.warehouses.is_empty());
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_reads_environment() {
        let config = from_map(&[
            ("PORT", "9000"),
            ("LOG_FORMAT", "JSON"),
            ("DATABASE_URL", "postgres://localhost/cajas"),
            ("WAREHOUSES", "ALM-1=SUC-1, ALM-2 = SUC-2,"),
        ])
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/cajas")
        );
        assert_eq!(
            config.warehouses,
            vec![
                (WarehouseId::new("ALM-1"), BranchId::new("SUC-1")),
                (WarehouseId::new("ALM-2"), BranchId::new("SUC-2")),
            ]
        );
    }

    #[test]
    fn test_unparsable_port_falls_back() {
        let config = from_map(&[("PORT", "not-a-port"), ("DATABASE_URL", " ")]).unwrap();
        assert_eq!(config.port, 3000);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_malformed_warehouse_entry() {
        assert_eq!(
            parse_warehouses("ALM-1=SUC-1,ALM-2").unwrap_err(),
            ConfigError::InvalidWarehouseEntry("ALM-2".to_string())
        );
        assert!(parse_warehouses("=SUC-1").is_err());
    }
}
