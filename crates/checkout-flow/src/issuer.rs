//! # Billing Key Issuer
//!
//! Obtains a billing key from the gateway SDK and registers it with the
//! backend, or hands off to the identity-confirmation redirect.

use crate::config::GatewayConfig;
use checkout_core::{
    BillingGateway, BillingPaymentRequest, CheckoutContextStore, CheckoutError, CheckoutResult,
    GatewayResponse, IssuanceStatus, IssueBillingKeyRequest, Navigator, RegisterBillingKey,
    SharedBackend,
};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// Amount of the BILLING-mode payment request used when the SDK has no
/// dedicated issuance call. No charge is captured.
pub const FALLBACK_AMOUNT: i64 = 100;
pub const FALLBACK_CURRENCY: &str = "KRW";
pub const FALLBACK_ORDER_NAME: &str = "Billing key registration";
pub const FALLBACK_CUSTOMER_ID: &str = "me";

/// Result of one issuance attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssuanceOutcome {
    /// Key registered with the backend
    Issued { billing_key: String },
    /// Browser sent to the redirect-landing page to finish confirmation
    NeedsConfirmation { redirect_url: String },
    Canceled { message: String },
    Failed { message: String },
}

impl IssuanceOutcome {
    /// Text to show the shopper
    pub fn message(&self) -> String {
        match self {
            IssuanceOutcome::Issued { .. } => "Card registered.".to_string(),
            IssuanceOutcome::NeedsConfirmation { .. } => {
                "Continuing to identity confirmation...".to_string()
            }
            IssuanceOutcome::Canceled { message } | IssuanceOutcome::Failed { message } => {
                message.clone()
            }
        }
    }
}

pub struct BillingKeyIssuer {
    gateway: Arc<dyn BillingGateway>,
    backend: SharedBackend,
    store: CheckoutContextStore,
    navigator: Arc<dyn Navigator>,
}

impl BillingKeyIssuer {
    pub fn new(
        gateway: Arc<dyn BillingGateway>,
        backend: SharedBackend,
        store: CheckoutContextStore,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            gateway,
            backend,
            store,
            navigator,
        }
    }

    /// Run one issuance attempt. Never returns an error; failures are
    /// reported in the outcome and logged.
    #[instrument(skip(self, config), fields(gateway = self.gateway.gateway_name()))]
    pub async fn issue(&self, config: &GatewayConfig) -> IssuanceOutcome {
        if let Err(e) = config.validate() {
            error!(error = %e, "Billing key issuance is not configured");
            return IssuanceOutcome::Failed {
                message: e.user_message(),
            };
        }

        let current_href = self.navigator.current_href();
        let redirect_url = match config.redirect_url(&current_href) {
            Ok(url) => url,
            Err(e) => {
                error!(error = %e, "Cannot derive redirect URL");
                return IssuanceOutcome::Failed {
                    message: e.user_message(),
                };
            }
        };

        self.store.remember_page(&current_href);

        let response = match self.request(config, &redirect_url).await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "Gateway issuance call failed");
                return IssuanceOutcome::Failed {
                    message: e.user_message(),
                };
            }
        };
        debug!(response = ?response, "Gateway issuance response");

        match self.settle(&response, &redirect_url).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "Billing key registration failed");
                IssuanceOutcome::Failed {
                    message: e.user_message(),
                }
            }
        }
    }

    async fn request(
        &self,
        config: &GatewayConfig,
        redirect_url: &str,
    ) -> CheckoutResult<GatewayResponse> {
        if self.gateway.supports_issue_billing_key() {
            let request = IssueBillingKeyRequest {
                store_id: config.store_id.clone(),
                channel_key: config.channel_key.clone(),
                redirect_url: redirect_url.to_string(),
                billing_key_method: config.billing_key_method.clone(),
            };
            return self.gateway.request_issue_billing_key(&request).await;
        }

        let request = BillingPaymentRequest {
            store_id: config.store_id.clone(),
            channel_key: config.channel_key.clone(),
            payment_id: format!("bk_{}", chrono::Utc::now().timestamp_millis()),
            order_name: FALLBACK_ORDER_NAME.to_string(),
            total_amount: FALLBACK_AMOUNT,
            currency: FALLBACK_CURRENCY.to_string(),
            customer_id: FALLBACK_CUSTOMER_ID.to_string(),
            method: config.billing_key_method.clone(),
            redirect_url: redirect_url.to_string(),
        };
        info!(payment_id = %request.payment_id, "Issuing billing key through BILLING payment request");
        self.gateway.request_billing_payment(&request).await
    }

    async fn settle(
        &self,
        response: &GatewayResponse,
        redirect_url: &str,
    ) -> CheckoutResult<IssuanceOutcome> {
        let attempt = response.attempt();

        if let Some(billing_key) = attempt.registrable_key() {
            let raw_json = serde_json::to_string(response)
                .map_err(|e| CheckoutError::Serialization(e.to_string()))?;
            self.backend
                .register_billing_key(&RegisterBillingKey {
                    billing_key: billing_key.to_string(),
                    raw_json,
                })
                .await?;
            info!("Billing key registered");
            return Ok(IssuanceOutcome::Issued {
                billing_key: billing_key.to_string(),
            });
        }

        if let Some(token) = attempt.confirmation_token() {
            let target = confirmation_redirect(redirect_url, token)?;
            info!("Identity confirmation required, redirecting");
            self.navigator.navigate(&target);
            return Ok(IssuanceOutcome::NeedsConfirmation {
                redirect_url: target,
            });
        }

        warn!(status = %attempt.status, code = ?response.code, "Billing key not issued");
        let message = response.message.clone();
        Ok(match attempt.status {
            IssuanceStatus::Canceled => IssuanceOutcome::Canceled {
                message: message.unwrap_or_else(|| "Card registration was canceled.".to_string()),
            },
            _ => IssuanceOutcome::Failed {
                message: match (&response.code, message) {
                    (_, Some(message)) => message,
                    (Some(code), None) => format!("Card registration failed ({}).", code),
                    (None, None) => "Card registration failed.".to_string(),
                },
            },
        })
    }
}

/// Redirect-landing URL carrying the issuance token
fn confirmation_redirect(redirect_url: &str, token: &str) -> CheckoutResult<String> {
    let mut url = Url::parse(redirect_url)
        .map_err(|e| CheckoutError::Configuration(format!("Invalid redirect URL: {}", e)))?;
    url.query_pairs_mut()
        .append_pair("transactionType", "ISSUE_BILLING_KEY")
        .append_pair("status", "NEEDS_CONFIRMATION")
        .append_pair("billingIssueToken", token);
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBackend, FakeGateway, RecordingNavigator};
    use checkout_core::context::LAST_CHECKOUT_QUERY_KEY;
    use checkout_core::{MemorySessionStorage, RedirectParams, SessionStorage};

    const PAGE: &str = "https://shop.example.com/?code=PRO&months=3#/plan/checkout";

    struct Harness {
        backend: Arc<FakeBackend>,
        gateway: Arc<FakeGateway>,
        navigator: Arc<RecordingNavigator>,
        storage: Arc<MemorySessionStorage>,
        issuer: BillingKeyIssuer,
    }

    fn harness(gateway: FakeGateway) -> Harness {
        let backend = Arc::new(FakeBackend::new());
        let gateway = Arc::new(gateway);
        let navigator = Arc::new(RecordingNavigator::at(PAGE));
        let storage = Arc::new(MemorySessionStorage::new());
        let issuer = BillingKeyIssuer::new(
            gateway.clone(),
            backend.clone(),
            CheckoutContextStore::new(storage.clone()),
            navigator.clone(),
        );
        Harness {
            backend,
            gateway,
            navigator,
            storage,
            issuer,
        }
    }

    fn config() -> GatewayConfig {
        GatewayConfig::new("store-1", "channel-key-1")
    }

    #[tokio::test]
    async fn test_issued_key_is_registered_once() {
        let h = harness(FakeGateway::returning(GatewayResponse {
            status: Some("ISSUED".into()),
            billing_key: Some("bk_live_1".into()),
            ..Default::default()
        }));

        let outcome = h.issuer.issue(&config()).await;

        assert_eq!(
            outcome,
            IssuanceOutcome::Issued {
                billing_key: "bk_live_1".into()
            }
        );
        let registered = h.backend.registered.lock().unwrap().clone();
        assert_eq!(registered.len(), 1);
        assert_eq!(registered[0].billing_key, "bk_live_1");
        assert!(registered[0].raw_json.contains("bk_live_1"));
        assert_eq!(
            h.storage.get_item(LAST_CHECKOUT_QUERY_KEY).as_deref(),
            Some("?code=PRO&months=3")
        );
    }

    #[tokio::test]
    async fn test_needs_confirmation_navigates_with_token() {
        let h = harness(FakeGateway::returning(GatewayResponse {
            status: Some("NEEDS_CONFIRMATION".into()),
            billing_issue_token: Some("tok_1".into()),
            ..Default::default()
        }));

        let outcome = h.issuer.issue(&config()).await;

        let visited = h.navigator.visited();
        assert_eq!(visited.len(), 1);
        assert_eq!(
            outcome,
            IssuanceOutcome::NeedsConfirmation {
                redirect_url: visited[0].clone()
            }
        );
        let params = RedirectParams::from_url(&visited[0]);
        assert_eq!(params.get("transactionType"), Some("ISSUE_BILLING_KEY"));
        assert_eq!(params.get("status"), Some("NEEDS_CONFIRMATION"));
        assert_eq!(params.get("billingIssueToken"), Some("tok_1"));
        assert!(visited[0].starts_with("https://shop.example.com/"));
        assert!(visited[0].ends_with("#/billing-keys/redirect"));
        assert_eq!(h.backend.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_placeholder_key_is_never_registered() {
        for status in [None, Some("ISSUED"), Some("NEEDS_CONFIRMATION"), Some("FAILED")] {
            let h = harness(FakeGateway::returning(GatewayResponse {
                status: status.map(String::from),
                billing_key: Some("billing-issue-token-abc".into()),
                billing_issue_token: Some("billing-issue-token-abc".into()),
                ..Default::default()
            }));

            let outcome = h.issuer.issue(&config()).await;

            assert!(!matches!(outcome, IssuanceOutcome::Issued { .. }), "{status:?}");
            assert_eq!(h.backend.count("register_billing_key"), 0, "{status:?}");
        }
    }

    #[tokio::test]
    async fn test_canceled_by_shopper() {
        let h = harness(FakeGateway::returning(GatewayResponse {
            status: Some("CANCELED".into()),
            message: Some("User closed the window".into()),
            ..Default::default()
        }));

        let outcome = h.issuer.issue(&config()).await;
        assert_eq!(
            outcome,
            IssuanceOutcome::Canceled {
                message: "User closed the window".into()
            }
        );
        assert_eq!(h.backend.total_calls(), 0);
        assert!(h.navigator.visited().is_empty());
    }

    #[tokio::test]
    async fn test_gateway_error_code() {
        let h = harness(FakeGateway::returning(GatewayResponse {
            code: Some("FAILURE_TYPE_PG".into()),
            ..Default::default()
        }));

        let outcome = h.issuer.issue(&config()).await;
        assert_eq!(
            outcome,
            IssuanceOutcome::Failed {
                message: "Card registration failed (FAILURE_TYPE_PG).".into()
            }
        );
    }

    #[tokio::test]
    async fn test_sdk_exception_leaves_no_registration() {
        let h = harness(FakeGateway::failing("sdk crashed"));

        let outcome = h.issuer.issue(&config()).await;
        assert!(matches!(outcome, IssuanceOutcome::Failed { .. }));
        assert_eq!(h.backend.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_config_skips_gateway() {
        let h = harness(FakeGateway::returning(GatewayResponse::default()));

        let outcome = h.issuer.issue(&GatewayConfig::new("", "channel-key-1")).await;
        assert!(matches!(outcome, IssuanceOutcome::Failed { .. }));
        assert!(h.gateway.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fallback_payment_request() {
        let h = harness(
            FakeGateway::returning(GatewayResponse {
                billing_key: Some("bk_live_2".into()),
                ..Default::default()
            })
            .without_issue_call(),
        );

        let outcome = h.issuer.issue(&config()).await;

        assert!(matches!(outcome, IssuanceOutcome::Issued { .. }));
        assert_eq!(
            *h.gateway.calls.lock().unwrap(),
            vec!["request_billing_payment"]
        );
        let request = h.gateway.fallback_requests.lock().unwrap()[0].clone();
        assert!(request.payment_id.starts_with("bk_"));
        assert_eq!(request.total_amount, 100);
        assert_eq!(request.currency, "KRW");
        assert_eq!(request.method, "CARD");
        assert_eq!(
            request.redirect_url,
            "https://shop.example.com/#/billing-keys/redirect"
        );
    }
}
