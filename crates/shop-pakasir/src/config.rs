//! # Pakasir Configuration
//!
//! Configuration management for the Pakasir QRIS integration.
//! Secrets are loaded from environment variables.

use shop_core::ShopError;
use std::env;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://app.pakasir.com";

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Pakasir API configuration
#[derive(Clone)]
pub struct PakasirConfig {
    /// Project slug registered with Pakasir
    pub project: String,

    /// Project API key, sent in every request body or query
    pub api_key: String,

    /// API base URL (for testing/mocking)
    pub base_url: String,

    /// Upper bound for every outbound call
    pub timeout: Duration,
}

impl PakasirConfig {
    /// Load configuration from environment variables.
    ///
    /// Required env vars:
    /// - `PAKASIR_SLUG`
    /// - `PAKASIR_API_KEY`
    ///
    /// Optional: `PAKASIR_BASE_URL`, `PAKASIR_TIMEOUT_SECS`
    pub fn from_env() -> Result<Self, ShopError> {
        dotenvy::dotenv().ok();

        let project = required("PAKASIR_SLUG")?;
        let api_key = required("PAKASIR_API_KEY")?;

        let timeout_secs = match env::var("PAKASIR_TIMEOUT_SECS") {
            Ok(raw) => raw.trim().parse::<u64>().ok().filter(|s| *s > 0).ok_or_else(|| {
                ShopError::Configuration(format!(
                    "PAKASIR_TIMEOUT_SECS must be a positive integer, got '{}'",
                    raw
                ))
            })?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };

        let mut config = Self::new(project, api_key).with_timeout(Duration::from_secs(timeout_secs));
        if let Ok(url) = env::var("PAKASIR_BASE_URL") {
            config = config.with_base_url(url);
        }
        Ok(config)
    }

    /// Create config with explicit values
    pub fn new(project: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Builder: set custom API base URL (for testing)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }
}

impl std::fmt::Debug for PakasirConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PakasirConfig")
            .field("project", &self.project)
            .field("api_key", &"***")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn required(key: &str) -> Result<String, ShopError> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ShopError::Configuration(format!("{} not set", key)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PakasirConfig::new("digishop", "key_123");
        assert_eq!(config.base_url, "https://app.pakasir.com");
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(
            config.endpoint("transactioncreate/qris"),
            "https://app.pakasir.com/api/transactioncreate/qris"
        );
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let config = PakasirConfig::new("digishop", "key_123").with_base_url("http://127.0.0.1:9000/");
        assert_eq!(
            config.endpoint("transactioncancel"),
            "http://127.0.0.1:9000/api/transactioncancel"
        );
    }

    #[test]
    fn test_debug_hides_api_key() {
        let config = PakasirConfig::new("digishop", "key_123");
        let printed = format!("{:?}", config);
        assert!(!printed.contains("key_123"));
        assert!(printed.contains("digishop"));
    }

    #[test]
    fn test_from_env_missing_slug() {
        env::remove_var("PAKASIR_SLUG");
        assert!(PakasirConfig::from_env().is_err());
    }
}
