//! # CLI Settings
//!
//! Backend, gateway and page-origin settings for the `plan-checkout` binary.
//! Read from `config/checkout.toml` when present, then overridden by
//! environment variables (and `.env`).

use checkout_backend::BackendConfig;
use checkout_core::{CheckoutError, PlanSelection};
use checkout_flow::GatewayConfig;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Origin used for page URLs when nothing is configured
pub const DEFAULT_APP_ORIGIN: &str = "http://localhost:3000";

const CONFIG_PATHS: [&str; 3] = [
    "config/checkout.toml",
    "../config/checkout.toml",
    "../../config/checkout.toml",
];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendSection {
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub auth_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewaySection {
    pub store_id: Option<String>,
    pub channel_key: Option<String>,
    pub billing_method: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppSection {
    pub origin: Option<String>,
}

/// Merged CLI settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub backend: BackendSection,
    #[serde(default)]
    pub gateway: GatewaySection,
    #[serde(default)]
    pub app: AppSection,
}

impl Settings {
    /// Load from `path`, or from the first config file found, then apply env overrides
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let mut settings = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
                Self::from_toml(&content)?
            }
            None => Self::discover()?,
        };
        settings.apply_overrides(|key| std::env::var(key).ok());
        Ok(settings)
    }

    fn discover() -> anyhow::Result<Self> {
        for path in CONFIG_PATHS {
            if let Ok(content) = std::fs::read_to_string(path) {
                let settings = Self::from_toml(&content)
                    .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path, e))?;
                tracing::info!("Loaded settings from {}", path);
                return Ok(settings);
            }
        }

        tracing::debug!("No settings file found, using environment only");
        Ok(Self::default())
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Override file values with whatever `lookup` knows. Empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("API_BASE_URL") {
            self.backend.base_url = Some(v);
        }
        if let Some(v) = get("API_TIMEOUT_SECS").and_then(|v| v.trim().parse().ok()) {
            self.backend.timeout_secs = Some(v);
        }
        if let Some(v) = get("API_AUTH_TOKEN") {
            self.backend.auth_token = Some(v);
        }
        if let Some(v) = get("PORTONE_STORE_ID") {
            self.gateway.store_id = Some(v);
        }
        if let Some(v) = get("PORTONE_CHANNEL_KEY") {
            self.gateway.channel_key = Some(v);
        }
        if let Some(v) = get("BILLING_METHOD") {
            self.gateway.billing_method = Some(v);
        }
        if let Some(v) = get("APP_ORIGIN") {
            self.app.origin = Some(v);
        }
    }

    pub fn backend_config(&self) -> Result<BackendConfig, CheckoutError> {
        let mut config = match self.backend.base_url {
            Some(ref url) => BackendConfig::new(url.clone()),
            None => BackendConfig::default(),
        };
        if let Some(secs) = self.backend.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        if let Some(ref token) = self.backend.auth_token {
            config = config.with_auth_token(token.clone());
        }
        config.validate()?;
        Ok(config)
    }

    pub fn gateway_config(&self) -> Result<GatewayConfig, CheckoutError> {
        let mut config = GatewayConfig::new(
            self.gateway.store_id.clone().unwrap_or_default(),
            self.gateway.channel_key.clone().unwrap_or_default(),
        )
        .with_app_origin(self.origin());
        if let Some(ref method) = self.gateway.billing_method {
            config = config.with_billing_method(method.clone());
        }
        config.validate()?;
        Ok(config)
    }

    /// Checkout page for `plan`, e.g. `https://shop.example.com/?code=PRO&months=3#/plan/checkout`
    pub fn checkout_page(&self, plan: &PlanSelection) -> Result<String, CheckoutError> {
        let mut url = Url::parse(&self.origin())
            .map_err(|e| CheckoutError::Configuration(format!("Invalid app origin: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("code", &plan.plan_code)
            .append_pair("months", &plan.months.to_string());
        url.set_fragment(Some("/plan/checkout"));
        Ok(url.to_string())
    }

    /// Origin the checkout pages live on
    pub fn origin(&self) -> String {
        self.app
            .origin
            .clone()
            .unwrap_or_else(|| DEFAULT_APP_ORIGIN.to_string())
            .trim_end_matches('/')
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const FILE: &str = r#"
        [backend]
        base_url = "https://api.example.com"
        timeout_secs = 30

        [gateway]
        store_id = "store-file"
        channel_key = "channel-key-file"
    "#;

    #[test]
    fn test_settings_from_toml() {
        let settings = Settings::from_toml(FILE).unwrap();
        let backend = settings.backend_config().unwrap();
        assert_eq!(backend.api_base_url, "https://api.example.com");
        assert_eq!(backend.timeout, Duration::from_secs(30));

        let gateway = settings.gateway_config().unwrap();
        assert_eq!(gateway.store_id, "store-file");
        assert_eq!(gateway.billing_key_method, "CARD");
        assert_eq!(settings.origin(), DEFAULT_APP_ORIGIN);
    }

    #[test]
    fn test_env_overrides_file() {
        let env: HashMap<&str, &str> = [
            ("API_BASE_URL", "https://staging.example.com"),
            ("PORTONE_STORE_ID", "store-env"),
            ("APP_ORIGIN", "https://shop.example.com/"),
            ("API_TIMEOUT_SECS", ""),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::from_toml(FILE).unwrap();
        settings.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(
            settings.backend.base_url.as_deref(),
            Some("https://staging.example.com")
        );
        assert_eq!(settings.backend.timeout_secs, Some(30));
        assert_eq!(settings.gateway.store_id.as_deref(), Some("store-env"));
        assert_eq!(settings.origin(), "https://shop.example.com");
    }

    #[test]
    fn test_checkout_page_encodes_plan_code() {
        let mut settings = Settings::default();
        settings.app.origin = Some("https://shop.example.com".into());

        let page = settings
            .checkout_page(&PlanSelection::new("PRO&months=99#x", 3))
            .unwrap();
        assert_eq!(
            page,
            "https://shop.example.com/?code=PRO%26months%3D99%23x&months=3#/plan/checkout"
        );
        assert_eq!(
            PlanSelection::from_query(page.split(['?', '#']).nth(1).unwrap()),
            PlanSelection::new("PRO&months=99#x", 3)
        );
    }

    #[test]
    fn test_checkout_page_rejects_bad_origin() {
        let mut settings = Settings::default();
        settings.app.origin = Some("not a url".into());
        assert!(matches!(
            settings.checkout_page(&PlanSelection::new("PRO", 1)),
            Err(CheckoutError::Configuration(_))
        ));
    }

    #[test]
    fn test_missing_gateway_ids() {
        let settings = Settings::default();
        assert!(settings.backend_config().is_ok());
        assert!(matches!(
            settings.gateway_config(),
            Err(CheckoutError::Configuration(_))
        ));
    }
}
