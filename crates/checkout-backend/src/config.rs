//! # Backend Configuration
//!
//! Connection settings for the payment/subscription backend.
//! Values are loaded from environment variables (and `.env` if present).

use checkout_core::CheckoutError;
use std::env;
use std::time::Duration;

/// Default backend used during local development
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080";

/// Default request timeout; long enough for slow gateway round-trips
pub const DEFAULT_TIMEOUT_SECS: u64 = 90;

/// Backend API configuration
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// API base URL (e.g. "https://api.example.com")
    pub api_base_url: String,

    /// Per-request timeout
    pub timeout: Duration,

    /// Bearer token for the shopper's session, if the backend wants one
    pub auth_token: Option<String>,
}

impl BackendConfig {
    /// Load configuration from environment variables.
    ///
    /// Optional env vars:
    /// - `API_BASE_URL` (default `http://localhost:8080`)
    /// - `API_TIMEOUT_SECS` (default 90)
    /// - `API_AUTH_TOKEN`
    pub fn from_env() -> Result<Self, CheckoutError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let api_base_url =
            env::var("API_BASE_URL").unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string());

        let timeout_secs = match env::var("API_TIMEOUT_SECS") {
            Ok(raw) => raw.trim().parse::<u64>().map_err(|_| {
                CheckoutError::Configuration(format!(
                    "API_TIMEOUT_SECS must be a whole number of seconds, got {:?}",
                    raw
                ))
            })?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };

        let config = Self {
            api_base_url,
            timeout: Duration::from_secs(timeout_secs),
            auth_token: env::var("API_AUTH_TOKEN").ok().filter(|t| !t.is_empty()),
        };
        config.validate()?;
        Ok(config)
    }

    /// Create config with an explicit base URL (for testing)
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            auth_token: None,
        }
    }

    /// Check the base URL is an absolute http(s) URL
    pub fn validate(&self) -> Result<(), CheckoutError> {
        let url = url::Url::parse(&self.api_base_url).map_err(|e| {
            CheckoutError::Configuration(format!(
                "API_BASE_URL {:?} is not a valid URL: {}",
                self.api_base_url, e
            ))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(CheckoutError::Configuration(
                "API_BASE_URL must use http or https".to_string(),
            ));
        }
        Ok(())
    }

    /// Get authorization header value, if a token is configured
    pub fn auth_header(&self) -> Option<String> {
        self.auth_token
            .as_ref()
            .map(|token| format!("Bearer {}", token))
    }

    /// Builder: set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builder: set bearer token
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE_URL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        assert!(BackendConfig::new("https://api.example.com").validate().is_ok());
        assert!(BackendConfig::new("ftp://api.example.com").validate().is_err());
        assert!(BackendConfig::new("not a url").validate().is_err());
    }

    #[test]
    fn test_auth_header() {
        let config = BackendConfig::default();
        assert_eq!(config.auth_header(), None);

        let config = config.with_auth_token("sess_abc");
        assert_eq!(config.auth_header().as_deref(), Some("Bearer sess_abc"));
    }

    #[test]
    fn test_defaults() {
        let config = BackendConfig::default();
        assert_eq!(config.api_base_url, "http://localhost:8080");
        assert_eq!(config.timeout, Duration::from_secs(90));
    }
}
