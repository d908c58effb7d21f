//! Recording test doubles for the flow collaborators.

use async_trait::async_trait;
use checkout_core::{
    BackendApi, BillingGateway, BillingPaymentRequest, CardOption, CheckoutError, CheckoutResult,
    ConfirmPayment, ConfirmedBillingKey, GatewayResponse, IssueBillingKeyRequest, Navigator,
    PaymentConfirmation, PaymentSnapshot, RegisterBillingKey, StartSubscription,
    SubscriptionInvoice,
};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::time::Instant;

/// Scripted backend that records every call
pub struct FakeBackend {
    pub calls: Mutex<Vec<String>>,
    pub poll_times: Mutex<Vec<Instant>>,
    /// Status responses in order; `Err` becomes a network error. When the
    /// script runs dry every lookup answers PENDING.
    pub status_script: Mutex<VecDeque<Result<PaymentSnapshot, String>>>,
    pub invoice_id: Mutex<Option<String>>,
    /// When set, subscription start fails with this network error
    pub invoice_error: Mutex<Option<String>>,
    pub confirmation: Mutex<Result<PaymentConfirmation, String>>,
    pub confirm_requests: Mutex<Vec<ConfirmPayment>>,
    pub start_requests: Mutex<Vec<StartSubscription>>,
    pub confirmed_key: Mutex<Result<Option<String>, String>>,
    pub registered: Mutex<Vec<RegisterBillingKey>>,
    pub cards: Mutex<Vec<CardOption>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            poll_times: Mutex::new(Vec::new()),
            status_script: Mutex::new(VecDeque::new()),
            invoice_id: Mutex::new(Some("1001".to_string())),
            invoice_error: Mutex::new(None),
            confirmation: Mutex::new(Ok(PaymentConfirmation {
                success: true,
                payment_id: Some("h1".to_string()),
                ..Default::default()
            })),
            confirm_requests: Mutex::new(Vec::new()),
            start_requests: Mutex::new(Vec::new()),
            confirmed_key: Mutex::new(Ok(None)),
            registered: Mutex::new(Vec::new()),
            cards: Mutex::new(Vec::new()),
        }
    }

    pub fn script_statuses(&self, script: Vec<Result<PaymentSnapshot, String>>) {
        *self.status_script.lock().unwrap() = script.into();
    }

    pub fn count(&self, op: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == op).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn record(&self, op: &str) {
        self.calls.lock().unwrap().push(op.to_string());
    }
}

#[async_trait]
impl BackendApi for FakeBackend {
    async fn list_billing_keys(&self) -> CheckoutResult<Vec<CardOption>> {
        self.record("list_billing_keys");
        Ok(self.cards.lock().unwrap().clone())
    }

    async fn register_billing_key(&self, request: &RegisterBillingKey) -> CheckoutResult<()> {
        self.record("register_billing_key");
        self.registered.lock().unwrap().push(request.clone());
        Ok(())
    }

    async fn confirm_billing_key(
        &self,
        billing_issue_token: &str,
    ) -> CheckoutResult<ConfirmedBillingKey> {
        self.record("confirm_billing_key");
        match &*self.confirmed_key.lock().unwrap() {
            Ok(key) => Ok(ConfirmedBillingKey {
                billing_key: key.clone(),
                raw: json!({ "billingKey": key, "token": billing_issue_token }),
            }),
            Err(msg) => Err(CheckoutError::Network(msg.clone())),
        }
    }

    async fn delete_billing_key_by_id(&self, pay_id: &str) -> CheckoutResult<()> {
        self.record("delete_billing_key_by_id");
        self.cards
            .lock()
            .unwrap()
            .retain(|c| c.pay_id.as_deref() != Some(pay_id));
        Ok(())
    }

    async fn delete_billing_key(&self, billing_key: &str) -> CheckoutResult<()> {
        self.record("delete_billing_key");
        self.cards
            .lock()
            .unwrap()
            .retain(|c| c.billing_key.as_deref() != Some(billing_key));
        Ok(())
    }

    async fn start_subscription(
        &self,
        request: &StartSubscription,
    ) -> CheckoutResult<SubscriptionInvoice> {
        self.record("start_subscription");
        self.start_requests.lock().unwrap().push(request.clone());
        if let Some(msg) = self.invoice_error.lock().unwrap().clone() {
            return Err(CheckoutError::Network(msg));
        }
        let invoice_id = self.invoice_id.lock().unwrap().clone();
        Ok(SubscriptionInvoice {
            raw: json!({ "invoiceId": invoice_id }),
            invoice_id,
        })
    }

    async fn confirm_payment(
        &self,
        request: &ConfirmPayment,
    ) -> CheckoutResult<PaymentConfirmation> {
        self.record("confirm_payment");
        self.confirm_requests.lock().unwrap().push(request.clone());
        match &*self.confirmation.lock().unwrap() {
            Ok(c) => Ok(c.clone()),
            Err(msg) => Err(CheckoutError::Backend {
                status: 500,
                message: msg.clone(),
            }),
        }
    }

    async fn payment_status(&self, _handle: &str) -> CheckoutResult<PaymentSnapshot> {
        self.record("payment_status");
        self.poll_times.lock().unwrap().push(Instant::now());
        match self.status_script.lock().unwrap().pop_front() {
            Some(Ok(snapshot)) => Ok(snapshot),
            Some(Err(msg)) => Err(CheckoutError::Network(msg)),
            None => Ok(PaymentSnapshot::new("PENDING", false)),
        }
    }

    async fn cancel_payment(&self, _payment_id: &str, _reason: &str) -> CheckoutResult<()> {
        self.record("cancel_payment");
        Ok(())
    }

    async fn cancel_renewal(&self, _reason: &str) -> CheckoutResult<()> {
        self.record("cancel_renewal");
        Ok(())
    }
}

/// Navigator that stays put and remembers where it was sent
pub struct RecordingNavigator {
    pub href: Mutex<String>,
    pub visited: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn at(href: &str) -> Self {
        Self {
            href: Mutex::new(href.to_string()),
            visited: Mutex::new(Vec::new()),
        }
    }

    pub fn visited(&self) -> Vec<String> {
        self.visited.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn current_href(&self) -> String {
        self.href.lock().unwrap().clone()
    }

    fn navigate(&self, url: &str) {
        self.visited.lock().unwrap().push(url.to_string());
    }
}

/// Gateway returning a canned response
pub struct FakeGateway {
    pub supports_issue: bool,
    pub response: Mutex<Result<GatewayResponse, String>>,
    pub calls: Mutex<Vec<&'static str>>,
    pub fallback_requests: Mutex<Vec<BillingPaymentRequest>>,
}

impl FakeGateway {
    pub fn returning(response: GatewayResponse) -> Self {
        Self {
            supports_issue: true,
            response: Mutex::new(Ok(response)),
            calls: Mutex::new(Vec::new()),
            fallback_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            response: Mutex::new(Err(message.to_string())),
            ..Self::returning(GatewayResponse::default())
        }
    }

    pub fn without_issue_call(mut self) -> Self {
        self.supports_issue = false;
        self
    }

    fn respond(&self) -> CheckoutResult<GatewayResponse> {
        match &*self.response.lock().unwrap() {
            Ok(resp) => Ok(resp.clone()),
            Err(msg) => Err(CheckoutError::Network(msg.clone())),
        }
    }
}

#[async_trait]
impl BillingGateway for FakeGateway {
    fn supports_issue_billing_key(&self) -> bool {
        self.supports_issue
    }

    async fn request_issue_billing_key(
        &self,
        _request: &IssueBillingKeyRequest,
    ) -> CheckoutResult<GatewayResponse> {
        self.calls.lock().unwrap().push("request_issue_billing_key");
        self.respond()
    }

    async fn request_billing_payment(
        &self,
        request: &BillingPaymentRequest,
    ) -> CheckoutResult<GatewayResponse> {
        self.calls.lock().unwrap().push("request_billing_payment");
        self.fallback_requests.lock().unwrap().push(request.clone());
        self.respond()
    }

    fn gateway_name(&self) -> &'static str {
        "fake"
    }
}
