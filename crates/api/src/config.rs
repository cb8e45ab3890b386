//! Application configuration loaded from environment variables.

use checkout::GatewayConfig;
use domain::Currency;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `GATEWAY_MERCHANT_KEY`: publishable gateway key (no default; paid
///   checkouts fail until it is set)
/// - `GATEWAY_CURRENCY`: `INR`, `USD` or `EUR` (default: `INR`)
/// - `GATEWAY_THEME_COLOR`: colour of the gateway sheet (default: `"#3399cc"`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub gateway: GatewayConfig,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through `lookup`, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = GatewayConfig::default();
        let currency = match lookup("GATEWAY_CURRENCY") {
            Some(raw) => raw.parse::<Currency>().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "ignoring GATEWAY_CURRENCY");
                defaults.currency
            }),
            None => defaults.currency,
        };

        Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            log_level: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            gateway: GatewayConfig {
                merchant_key: lookup("GATEWAY_MERCHANT_KEY"),
                currency,
                theme_color: lookup("GATEWAY_THEME_COLOR").unwrap_or(defaults.theme_color),
                description: defaults.description,
            },
        }
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
            gateway: GatewayConfig::default(),
        }
    }
}
