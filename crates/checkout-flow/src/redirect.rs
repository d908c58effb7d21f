//! # Redirect Confirmation Handler
//!
//! Runs on the redirect-landing page after the gateway sends the shopper
//! back. Reads the merged redirect parameters, finishes a pending
//! identity confirmation, and offers the way back to checkout.

use checkout_core::params::keys;
use checkout_core::{
    is_placeholder_billing_key, CheckoutContextStore, CheckoutError, CheckoutResult, Navigator,
    RedirectParams, RegisterBillingKey, SharedBackend,
};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// What the landing page tells the shopper
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectOutcome {
    /// Token exchanged and the confirmed key registered
    Registered { billing_key: String },
    /// Confirmation returned no usable key
    ConfirmationFailed,
    Canceled,
    /// Issuance probably still settling
    Pending,
    /// No recognizable parameter combination
    InvalidAccess,
    /// A confirm or register call failed
    Error { message: String },
}

impl RedirectOutcome {
    pub fn message(&self) -> String {
        match self {
            RedirectOutcome::Registered { .. } => "Card registered.".to_string(),
            RedirectOutcome::ConfirmationFailed => {
                "Identity confirmation failed. Please try again.".to_string()
            }
            RedirectOutcome::Canceled => "Card registration was canceled.".to_string(),
            RedirectOutcome::Pending => {
                "Card registration is being processed. Please check back shortly.".to_string()
            }
            RedirectOutcome::InvalidAccess => "Invalid access.".to_string(),
            RedirectOutcome::Error { message } => message.clone(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RedirectOutcome::Registered { .. })
    }
}

pub struct RedirectConfirmationHandler {
    backend: SharedBackend,
    store: CheckoutContextStore,
    navigator: Arc<dyn Navigator>,
}

impl RedirectConfirmationHandler {
    pub fn new(
        backend: SharedBackend,
        store: CheckoutContextStore,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            backend,
            store,
            navigator,
        }
    }

    /// Handle the page the navigator is currently on
    pub async fn handle(&self) -> RedirectOutcome {
        let href = self.navigator.current_href();
        self.handle_url(&href).await
    }

    #[instrument(skip(self, href))]
    pub async fn handle_url(&self, href: &str) -> RedirectOutcome {
        let params = RedirectParams::from_url(href);
        debug!(params = params.len(), "Redirect parameters merged");

        let tx_type = params.pick_upper(keys::TRANSACTION_TYPE);
        let status = params.pick_upper(keys::STATUS);
        let status_like = if status.is_empty() {
            params.pick_upper(keys::STATUS_ECHO)
        } else {
            status.clone()
        };
        let token = params.pick(keys::ISSUE_TOKEN);

        if status_like == "NEEDS_CONFIRMATION" {
            if let Some(token) = token {
                return match self.confirm(token).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        error!(error = %e, "Billing key confirmation failed");
                        RedirectOutcome::Error {
                            message: e.user_message(),
                        }
                    }
                };
            }
        }

        match status.as_str() {
            "CANCELED" | "CANCELLED" | "FAILED" => {
                info!(status = %status, "Issuance canceled at the gateway");
                return RedirectOutcome::Canceled;
            }
            "ISSUED" => return RedirectOutcome::Pending,
            _ => {}
        }
        if tx_type == "ISSUE_BILLING_KEY" {
            return RedirectOutcome::Pending;
        }

        warn!(tx_type = %tx_type, status = %status, "Unrecognized redirect parameters");
        RedirectOutcome::InvalidAccess
    }

    async fn confirm(&self, token: &str) -> CheckoutResult<RedirectOutcome> {
        let confirmed = self.backend.confirm_billing_key(token).await?;

        let billing_key = match confirmed.billing_key {
            Some(key) if !key.is_empty() && !is_placeholder_billing_key(&key) => key,
            _ => {
                warn!("Confirmation returned no usable billing key");
                return Ok(RedirectOutcome::ConfirmationFailed);
            }
        };

        let raw_json = serde_json::to_string(&confirmed.raw)
            .map_err(|e| CheckoutError::Serialization(e.to_string()))?;
        self.backend
            .register_billing_key(&RegisterBillingKey {
                billing_key: billing_key.clone(),
                raw_json,
            })
            .await?;
        info!("Confirmed billing key registered");
        Ok(RedirectOutcome::Registered { billing_key })
    }

    /// Send the shopper back to checkout, never to a foreign origin.
    /// Returns the target, or `None` if the current page URL is unusable.
    pub fn return_to_checkout(&self) -> Option<String> {
        let current = self.navigator.current_href();
        let target = self.store.get().return_url(&current)?;
        info!(target = %target, "Returning to checkout");
        self.navigator.navigate(&target);
        Some(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBackend, RecordingNavigator};

    const ORIGIN: &str = "https://shop.example.com";

    fn setup(href: &str) -> (Arc<FakeBackend>, Arc<RecordingNavigator>, CheckoutContextStore, RedirectConfirmationHandler) {
        let backend = Arc::new(FakeBackend::new());
        let navigator = Arc::new(RecordingNavigator::at(href));
        let store = CheckoutContextStore::in_memory();
        let handler =
            RedirectConfirmationHandler::new(backend.clone(), store.clone(), navigator.clone());
        (backend, navigator, store, handler)
    }

    #[tokio::test]
    async fn test_confirm_and_register() {
        let href = format!(
            "{ORIGIN}/?transactionType=ISSUE_BILLING_KEY&status=NEEDS_CONFIRMATION&billingIssueToken=tok_1#/billing-keys/redirect"
        );
        let (backend, _, _, handler) = setup(&href);
        *backend.confirmed_key.lock().unwrap() = Ok(Some("bk_live_9".into()));

        let outcome = handler.handle().await;

        assert_eq!(
            outcome,
            RedirectOutcome::Registered {
                billing_key: "bk_live_9".into()
            }
        );
        assert_eq!(backend.count("confirm_billing_key"), 1);
        assert_eq!(backend.count("register_billing_key"), 1);
        assert_eq!(backend.registered.lock().unwrap()[0].billing_key, "bk_live_9");
    }

    #[tokio::test]
    async fn test_token_in_router_fragment() {
        let href = format!("{ORIGIN}/#/?result=needs_confirmation&issueToken=tok_2");
        let (backend, _, _, handler) = setup(&href);
        *backend.confirmed_key.lock().unwrap() = Ok(Some("bk_live_3".into()));

        assert!(handler.handle().await.is_success());
    }

    #[tokio::test]
    async fn test_status_echoed_in_billing_key_field() {
        let href = format!(
            "{ORIGIN}/#/billing-keys/redirect?billingKey=NEEDS_CONFIRMATION&token=tok_3"
        );
        let (backend, _, _, handler) = setup(&href);
        *backend.confirmed_key.lock().unwrap() = Ok(Some("bk_live_4".into()));

        assert!(handler.handle().await.is_success());
        assert_eq!(backend.count("confirm_billing_key"), 1);
    }

    #[tokio::test]
    async fn test_confirmed_placeholder_is_not_registered() {
        let href = format!("{ORIGIN}/?status=NEEDS_CONFIRMATION&billingIssueToken=tok_1");
        let (backend, _, _, handler) = setup(&href);
        *backend.confirmed_key.lock().unwrap() = Ok(Some("billing-issue-token-tok_1".into()));

        assert_eq!(handler.handle().await, RedirectOutcome::ConfirmationFailed);
        assert_eq!(backend.count("register_billing_key"), 0);
    }

    #[tokio::test]
    async fn test_confirm_error_is_reported() {
        let href = format!("{ORIGIN}/?status=NEEDS_CONFIRMATION&billingIssueToken=tok_1");
        let (backend, _, _, handler) = setup(&href);
        *backend.confirmed_key.lock().unwrap() = Err("connection refused".into());

        let outcome = handler.handle().await;
        assert!(matches!(outcome, RedirectOutcome::Error { .. }));
        assert_eq!(backend.count("register_billing_key"), 0);

        // recovery still available after a failure
        assert!(handler.return_to_checkout().is_some());
    }

    #[tokio::test]
    async fn test_decision_order_without_network() {
        let cases = [
            ("?status=CANCELED", RedirectOutcome::Canceled),
            ("?result=failed", RedirectOutcome::Canceled),
            ("?status=ISSUED", RedirectOutcome::Pending),
            ("?txType=issue_billing_key", RedirectOutcome::Pending),
            // token missing: falls through to the transaction type
            (
                "?transactionType=ISSUE_BILLING_KEY&status=NEEDS_CONFIRMATION",
                RedirectOutcome::Pending,
            ),
            ("?foo=bar", RedirectOutcome::InvalidAccess),
            ("", RedirectOutcome::InvalidAccess),
        ];
        for (query, expected) in cases {
            let (backend, _, _, handler) = setup(&format!("{ORIGIN}/{query}#/billing-keys/redirect"));
            assert_eq!(handler.handle().await, expected, "{query}");
            assert_eq!(backend.total_calls(), 0, "{query}");
        }
    }

    #[test]
    fn test_return_to_stored_checkout() {
        let (_, navigator, store, handler) = setup(&format!("{ORIGIN}/?status=ISSUED#/billing-keys/redirect"));
        store.remember_page(&format!("{ORIGIN}/?code=PRO#/plan/checkout"));

        let target = handler.return_to_checkout().unwrap();
        assert_eq!(target, format!("{ORIGIN}/?code=PRO#/plan/checkout"));
        assert_eq!(navigator.visited(), vec![target]);
    }

    #[test]
    fn test_return_rejects_foreign_origin() {
        let (_, navigator, store, handler) = setup(&format!("{ORIGIN}/#/billing-keys/redirect"));
        store.remember_page("https://evil.example.net/?code=PRO#/plan/checkout");

        let target = handler.return_to_checkout().unwrap();
        assert_eq!(target, format!("{ORIGIN}/#/plan/checkout?code=PRO"));
        assert_eq!(navigator.visited().len(), 1);
    }
}
