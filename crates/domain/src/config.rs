//! Domain configuration loaded from environment variables.

use std::time::Duration;

/// Knobs shared by every domain service.
///
/// Reads from environment variables:
/// - `STORE_TIMEOUT_MS` — per-call persistence timeout (default: `5000`)
/// - `MAX_CONFLICT_RETRIES` — automatic retries on version conflicts (default: `3`)
/// - `CURRENCY_PRECISION` — decimals used to render money (default: `2`)
/// - `ALLOW_NEGATIVE_CLOSE` — accept closing a caja with a negative balance (default: `false`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainConfig {
    pub store_timeout: Duration,
    pub max_conflict_retries: u32,
    pub currency_precision: u32,
    pub allow_negative_close: bool,
}

impl DomainConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            store_timeout: lookup("STORE_TIMEOUT_MS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.store_timeout),
            max_conflict_retries: lookup("MAX_CONFLICT_RETRIES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_conflict_retries),
            currency_precision: lookup("CURRENCY_PRECISION")
                .and_then(|v| v.parse().ok())
                .filter(|p| *p <= 6)
                .unwrap_or(defaults.currency_precision),
            allow_negative_close: lookup("ALLOW_NEGATIVE_CLOSE")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.allow_negative_close),
        }
    }
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(5),
            max_conflict_retries: 3,
            currency_precision: common::DEFAULT_PRECISION,
            allow_negative_close: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_map(vars: &[(&str, &str)]) -> DomainConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DomainConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = DomainConfig::default();
        assert_eq!(config.store_timeout, Duration::from_secs(5));
        assert_eq!(config.max_conflict_retries, 3);
        assert_eq!(config.currency_precision, 2);
        assert!(!config.allow_negative_close);
    }

    #[test]
    fn test_overrides() {
        let config = from_map(&[
            ("STORE_TIMEOUT_MS", "250"),
            ("MAX_CONFLICT_RETRIES", "0"),
            ("CURRENCY_PRECISION", "3"),
            ("ALLOW_NEGATIVE_CLOSE", "TRUE"),
        ]);
        assert_eq!(config.store_timeout, Duration::from_millis(250));
        assert_eq!(config.max_conflict_retries, 0);
        assert_eq!(config.currency_precision, 3);
        assert!(config.allow_negative_close);
    }

    #[test]
    fn test_garbage_falls_back_to_defaults() {
        let config = from_map(&[("STORE_TIMEOUT_MS", "soon"), ("CURRENCY_PRECISION", "40")]);
        assert_eq!(config, DomainConfig::default());
    }
}
