//! API configuration
//!
//! Values are layered, later sources winning:
//!
//! 1. built-in defaults (`DATABASE_URL` is honoured as the default URL)
//! 2. `config/billing.toml`, if present
//! 3. `API_*` environment variables, with `__` between nested keys,
//!    e.g. `API_PORT=9000` or `API_BILLING__SUSPENSION_GRACE_DAYS=45`

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use domain_billing::BillingConfig;

/// API configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Database URL
    pub database_url: String,
    /// Maximum pooled database connections
    pub database_max_connections: u32,
    /// Log level or `EnvFilter` directive
    pub log_level: String,
    /// Emit logs as JSON lines
    pub log_json: bool,
    /// Pricing and debt-lifecycle settings
    pub billing: BillingConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            database_url: "postgres://localhost/billing".to_string(),
            database_max_connections: 10,
            log_level: "info".to_string(),
            log_json: false,
            billing: BillingConfig::default(),
        }
    }
}

impl ApiConfig {
    /// Loads configuration from `config/billing.toml` and the environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config/billing")
    }

    /// Loads configuration using a specific file stem
    pub fn load_from(file: &str) -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(File::with_name(file).required(false));
        if let Ok(url) = std::env::var("DATABASE_URL") {
            builder = builder.set_default("database_url", url)?;
        }

        let config: ApiConfig = builder
            .add_source(
                Environment::with_prefix("API")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        config
            .billing
            .validate()
            .map_err(|e| ConfigError::Message(e.to_string()))?;
        Ok(config)
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.server_addr(), "0.0.0.0:8080");
        assert_eq!(config.billing.payment_term_days, 15);
        assert_eq!(config.billing.suspension_grace_days, 30);
    }

    #[test]
    fn test_missing_file_is_optional() {
        let config = ApiConfig::load_from("does/not/exist").unwrap();
        assert_eq!(config.billing.payment_term_days, 15);
    }
}
