//! Application configuration loaded from environment variables.

use std::sync::Arc;
use std::time::Duration;

use domain::{FlatRateTax, Money, NoDiscount, PricingPolicy, ThresholdShipping};

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default `0.0.0.0`)
/// - `PORT`: listen port (default `3000`)
/// - `RUST_LOG`: tracing filter directive (default `info`)
/// - `DATABASE_URL`: PostgreSQL connection string; unset means in-memory stores
/// - `TAX_RATE_BPS`: tax rate in basis points (default `1000`)
/// - `FREE_SHIPPING_THRESHOLD_CENTS`: subtotal above which shipping is free (default `10000`)
/// - `FLAT_SHIPPING_FEE_CENTS`: shipping fee otherwise (default `500`)
/// - `CATALOG_TIMEOUT_MS`: bound on every catalog call (default `2000`)
/// - `CATALOG_SEED_FILE`: JSON array of products loaded at startup
///
/// Values that fail to parse fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub tax_rate_bps: u32,
    pub free_shipping_threshold_cents: i64,
    pub flat_shipping_fee_cents: i64,
    pub catalog_timeout_ms: u64,
    pub catalog_seed_file: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            host: non_empty("HOST").unwrap_or(defaults.host),
            port: parse_or(lookup("PORT"), defaults.port),
            log_level: non_empty("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: non_empty("DATABASE_URL"),
            tax_rate_bps: parse_or(lookup("TAX_RATE_BPS"), defaults.tax_rate_bps),
            free_shipping_threshold_cents: parse_or(
                lookup("FREE_SHIPPING_THRESHOLD_CENTS"),
                defaults.free_shipping_threshold_cents,
            ),
            flat_shipping_fee_cents: parse_or(
                lookup("FLAT_SHIPPING_FEE_CENTS"),
                defaults.flat_shipping_fee_cents,
            ),
            catalog_timeout_ms: parse_or(lookup("CATALOG_TIMEOUT_MS"), defaults.catalog_timeout_ms),
            catalog_seed_file: non_empty("CATALOG_SEED_FILE"),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn catalog_timeout(&self) -> Duration {
        Duration::from_millis(self.catalog_timeout_ms)
    }

    /// Tax, shipping and discount rules for new orders.
    pub fn pricing_policy(&self) -> PricingPolicy {
        PricingPolicy::new(
            Arc::new(FlatRateTax::new(self.tax_rate_bps)),
            Arc::new(ThresholdShipping::new(
                Money::from_cents(self.free_shipping_threshold_cents),
                Money::from_cents(self.flat_shipping_fee_cents),
            )),
            Arc::new(NoDiscount),
        )
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            tax_rate_bps: FlatRateTax::DEFAULT_RATE_BPS,
            free_shipping_threshold_cents: 10_000,
            flat_shipping_fee_cents: 500,
            catalog_timeout_ms: 2_000,
            catalog_seed_file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.tax_rate_bps, 1000);
        assert_eq!(config.catalog_timeout(), Duration::from_secs(2));
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_empty_environment_gives_defaults() {
        assert_eq!(Config::from_lookup(lookup(&[])), Config::default());
    }

    #[test]
    fn test_values_are_read() {
        let config = Config::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("DATABASE_URL", "postgres://localhost/orders"),
            ("TAX_RATE_BPS", "825"),
            ("FREE_SHIPPING_THRESHOLD_CENTS", "5000"),
            ("CATALOG_SEED_FILE", "catalog.json"),
        ]));

        assert_eq!(config.port, 8080);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/orders"));
        assert_eq!(config.tax_rate_bps, 825);
        assert_eq!(config.free_shipping_threshold_cents, 5000);
        assert_eq!(config.catalog_seed_file.as_deref(), Some("catalog.json"));
    }

    #[test]
    fn test_unparseable_values_fall_back() {
        let config = Config::from_lookup(lookup(&[
            ("PORT", "eighty"),
            ("CATALOG_TIMEOUT_MS", "-5"),
            ("DATABASE_URL", "  "),
        ]));

        assert_eq!(config.port, 3000);
        assert_eq!(config.catalog_timeout_ms, 2000);
        assert!(config.database_url.is_none());
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
    fn test_pricing_policy_uses_configured_rules() {
        let config = Config {
            tax_rate_bps: 500,
            free_shipping_threshold_cents: 2_000,
            flat_shipping_fee_cents: 300,
            ..Config::default()
        };
        let policy = config.pricing_policy();

        let small = policy.totals(domain::Channel::B2c, Money::from_cents(1_000));
        assert_eq!(small.tax, Money::from_cents(50));
        assert_eq!(small.shipping, Money::from_cents(300));

        let large = policy.totals(domain::Channel::B2c, Money::from_cents(2_001));
        assert_eq!(large.shipping, Money::zero());
    }
}
