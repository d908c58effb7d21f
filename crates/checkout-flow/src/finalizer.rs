//! # Result Finalizer
//!
//! Runs once on the payment result page. Confirms the payment with the
//! backend from whatever the URL (or the session) still knows, then moves
//! the shopper on to their subscription.
//!
//! Input priority:
//! 1. gateway error `code`/`message` in the URL: fail, no network call
//! 2. a well-formed invoice id (URL first, then session): confirm by invoice
//! 3. `paymentId` with a numeric `amount`: confirm by payment
//! 4. otherwise: insufficient information, no network call

use checkout_core::navigation::SUBSCRIPTION_STATUS_PATH;
use checkout_core::params::keys;
use checkout_core::{
    CheckoutContextStore, ConfirmPayment, InvoiceId, Navigator, RedirectParams, SharedBackend,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Pause between the success message and leaving the result page
pub const SUCCESS_REDIRECT_DELAY: Duration = Duration::from_millis(1_200);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// The gateway reported an error code or message in the redirect
    GatewayError {
        code: Option<String>,
        message: String,
    },
    /// Backend confirmed the payment; the shopper was sent to `redirect_to`
    Confirmed { redirect_to: String },
    /// Backend refused the confirmation or the call failed
    Rejected { message: String },
    InsufficientInformation,
}

impl FinalizeOutcome {
    pub fn message(&self) -> String {
        match self {
            FinalizeOutcome::GatewayError {
                code: Some(code),
                message,
            } => format!("{} ({})", message, code),
            FinalizeOutcome::GatewayError { code: None, message } => message.clone(),
            FinalizeOutcome::Confirmed { .. } => {
                "Payment confirmed. Taking you to your subscription...".to_string()
            }
            FinalizeOutcome::Rejected { message } => message.clone(),
            FinalizeOutcome::InsufficientInformation => {
                "Not enough information to confirm the payment.".to_string()
            }
        }
    }
}

pub struct ResultFinalizer {
    backend: SharedBackend,
    store: CheckoutContextStore,
    navigator: Arc<dyn Navigator>,
    started: AtomicBool,
    redirect_delay: Duration,
}

impl ResultFinalizer {
    pub fn new(
        backend: SharedBackend,
        store: CheckoutContextStore,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            backend,
            store,
            navigator,
            started: AtomicBool::new(false),
            redirect_delay: SUCCESS_REDIRECT_DELAY,
        }
    }

    /// Builder: change the pause before leaving the result page
    pub fn with_redirect_delay(mut self, delay: Duration) -> Self {
        self.redirect_delay = delay;
        self
    }

    /// Finalize the page the navigator is on. `None` if already run.
    pub async fn run(&self) -> Option<FinalizeOutcome> {
        let href = self.navigator.current_href();
        self.run_url(&href).await
    }

    pub async fn run_url(&self, href: &str) -> Option<FinalizeOutcome> {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("Result finalizer already ran");
            return None;
        }
        Some(self.finalize(href).await)
    }

    #[instrument(skip(self, href))]
    async fn finalize(&self, href: &str) -> FinalizeOutcome {
        let params = RedirectParams::from_url(href);

        let code = params.pick(keys::ERROR_CODE);
        let gateway_message = params.pick(keys::ERROR_MESSAGE);
        if code.is_some() || gateway_message.is_some() {
            let message = gateway_message.unwrap_or("Payment failed.").to_string();
            warn!(code = ?code, message = %message, "Gateway reported a payment error");
            return FinalizeOutcome::GatewayError {
                code: code.map(String::from),
                message,
            };
        }

        let request = match self.confirmation_request(&params) {
            Some(request) => request,
            None => {
                warn!("No invoice id or payment id to confirm");
                return FinalizeOutcome::InsufficientInformation;
            }
        };
        info!(request = ?request, "Confirming payment");

        match self.backend.confirm_payment(&request).await {
            Ok(confirmation) if confirmation.success => {
                self.store.clear_pending_invoice();
                tokio::time::sleep(self.redirect_delay).await;
                self.navigator.navigate(SUBSCRIPTION_STATUS_PATH);
                FinalizeOutcome::Confirmed {
                    redirect_to: SUBSCRIPTION_STATUS_PATH.to_string(),
                }
            }
            Ok(confirmation) => {
                warn!(message = ?confirmation.message, "Payment confirmation refused");
                FinalizeOutcome::Rejected {
                    message: confirmation
                        .message
                        .unwrap_or_else(|| "Payment confirmation failed.".to_string()),
                }
            }
            Err(e) => {
                error!(error = %e, "Payment confirmation failed");
                FinalizeOutcome::Rejected {
                    message: e.user_message(),
                }
            }
        }
    }

    fn confirmation_request(&self, params: &RedirectParams) -> Option<ConfirmPayment> {
        let invoice_id = params
            .pick(keys::INVOICE_ID)
            .and_then(|raw| InvoiceId::parse(raw).ok())
            .or_else(|| self.store.pending_invoice());
        if let Some(invoice_id) = invoice_id {
            return Some(ConfirmPayment::ByInvoice(invoice_id));
        }

        let payment_id = params.pick(keys::PAYMENT_ID)?;
        let amount = params.pick(keys::AMOUNT)?.trim().parse::<i64>().ok()?;
        Some(ConfirmPayment::ByPayment {
            payment_id: payment_id.to_string(),
            amount,
        })
    }
}
