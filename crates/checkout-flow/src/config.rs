//! # Gateway Configuration
//!
//! Store/channel identifiers for the payment gateway SDK.
//! All values are loaded from environment variables.

use checkout_core::navigation::billing_key_redirect_url;
use checkout_core::CheckoutError;
use std::env;
use url::Url;

/// Billing method requested when none is configured
pub const DEFAULT_BILLING_METHOD: &str = "CARD";

/// Gateway SDK configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Gateway store id (store-...)
    pub store_id: String,

    /// Channel key selecting the PG contract (channel-key-...)
    pub channel_key: String,

    /// Billing method passed to the SDK, e.g. "CARD"
    pub billing_key_method: String,

    /// Origin of this client; derived from the current page when unset
    pub app_origin: Option<String>,
}

impl GatewayConfig {
    /// Load configuration from environment variables.
    ///
    /// Required env vars:
    /// - `PORTONE_STORE_ID`
    /// - `PORTONE_CHANNEL_KEY`
    ///
    /// Optional: `BILLING_METHOD` (default `CARD`), `APP_ORIGIN`.
    pub fn from_env() -> Result<Self, CheckoutError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let store_id = env::var("PORTONE_STORE_ID")
            .map_err(|_| CheckoutError::Configuration("PORTONE_STORE_ID not set".to_string()))?;

        let channel_key = env::var("PORTONE_CHANNEL_KEY").map_err(|_| {
            CheckoutError::Configuration("PORTONE_CHANNEL_KEY not set".to_string())
        })?;

        let config = Self {
            store_id,
            channel_key,
            billing_key_method: env::var("BILLING_METHOD")
                .unwrap_or_else(|_| DEFAULT_BILLING_METHOD.to_string()),
            app_origin: env::var("APP_ORIGIN").ok().filter(|o| !o.is_empty()),
        };
        config.validate()?;
        Ok(config)
    }

    /// Create config with explicit values
    pub fn new(store_id: impl Into<String>, channel_key: impl Into<String>) -> Self {
        Self {
            store_id: store_id.into(),
            channel_key: channel_key.into(),
            billing_key_method: DEFAULT_BILLING_METHOD.to_string(),
            app_origin: None,
        }
    }

    /// Builder: pin the client origin instead of deriving it from the page
    pub fn with_app_origin(mut self, origin: impl Into<String>) -> Self {
        self.app_origin = Some(origin.into());
        self
    }

    /// Builder: set billing method
    pub fn with_billing_method(mut self, method: impl Into<String>) -> Self {
        self.billing_key_method = method.into();
        self
    }

    pub fn validate(&self) -> Result<(), CheckoutError> {
        if self.store_id.trim().is_empty() {
            return Err(CheckoutError::Configuration(
                "PORTONE_STORE_ID not set".to_string(),
            ));
        }
        if self.channel_key.trim().is_empty() {
            return Err(CheckoutError::Configuration(
                "PORTONE_CHANNEL_KEY not set".to_string(),
            ));
        }
        Ok(())
    }

    /// Redirect-landing URL the gateway sends the shopper back to
    pub fn redirect_url(&self, current_href: &str) -> Result<String, CheckoutError> {
        let origin = match self.app_origin {
            Some(ref origin) => origin.clone(),
            None => {
                let current = Url::parse(current_href).map_err(|e| {
                    CheckoutError::Configuration(format!("Current page URL is invalid: {}", e))
                })?;
                current.origin().ascii_serialization()
            }
        };
        Ok(billing_key_redirect_url(&origin))
    }
}
