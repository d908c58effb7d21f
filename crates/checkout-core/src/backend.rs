//! # Backend API Trait
//!
//! The payment/subscription REST backend as the checkout flows see it.
//! Implementations translate the backend's unstable field names into the
//! canonical types below, so the flows only ever see one name per field.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    BackendApi (trait)                    │
//! │  ├── billing keys: list / register / confirm / delete    │
//! │  ├── start_subscription()         → invoice              │
//! │  ├── confirm_payment()            → payment handle       │
//! │  └── payment_status()             → PaymentSnapshot      │
//! └──────────────────────────────────────────────────────────┘
//!                            ▲
//!            ┌───────────────┴───────────────┐
//!    ┌───────┴───────┐               ┌───────┴───────┐
//!    │  HttpBackend  │               │ test doubles  │
//!    └───────────────┘               └───────────────┘
//! ```

use crate::error::{CheckoutError, CheckoutResult};
use crate::model::{CardOption, InvoiceId, PaymentSnapshot, PaymentSource, PlanSelection};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Register a confirmed billing key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterBillingKey {
    pub billing_key: String,
    /// Serialized gateway or confirm response, kept by the backend for audit
    pub raw_json: String,
}

/// Result of exchanging an issuance token
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmedBillingKey {
    pub billing_key: Option<String>,
    pub raw: serde_json::Value,
}

/// Subscription start request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartSubscription {
    pub plan: PlanSelection,
    pub source: PaymentSource,
}

/// Invoice created by a subscription start
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionInvoice {
    /// Identifier read from whichever field the backend used; `None` if absent
    pub invoice_id: Option<String>,
    pub raw: serde_json::Value,
}

/// Payment confirmation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmPayment {
    ByInvoice(InvoiceId),
    ByPayment { payment_id: String, amount: i64 },
}

/// Canonical payment confirmation response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentConfirmation {
    pub success: bool,
    pub payment_id: Option<String>,
    pub order_id: Option<String>,
    pub message: Option<String>,
}

impl PaymentConfirmation {
    /// Handle to poll with: the payment id when present, else the order id
    pub fn handle(&self) -> Option<&str> {
        self.payment_id
            .as_deref()
            .or(self.order_id.as_deref())
            .filter(|h| !h.is_empty())
    }
}

/// Payment/subscription backend.
#[async_trait]
pub trait BackendApi: Send + Sync {
    /// Registered billing keys of the signed-in shopper
    async fn list_billing_keys(&self) -> CheckoutResult<Vec<CardOption>>;

    async fn register_billing_key(&self, request: &RegisterBillingKey) -> CheckoutResult<()>;

    /// Exchange an issuance token for a confirmed billing key
    async fn confirm_billing_key(&self, billing_issue_token: &str)
        -> CheckoutResult<ConfirmedBillingKey>;

    /// Soft-delete a billing key by its backend id
    async fn delete_billing_key_by_id(&self, pay_id: &str) -> CheckoutResult<()>;

    /// Soft-delete a billing key by the key itself
    async fn delete_billing_key(&self, billing_key: &str) -> CheckoutResult<()>;

    async fn start_subscription(
        &self,
        request: &StartSubscription,
    ) -> CheckoutResult<SubscriptionInvoice>;

    async fn confirm_payment(&self, request: &ConfirmPayment)
        -> CheckoutResult<PaymentConfirmation>;

    /// Status lookup for a payment handle
    async fn payment_status(&self, handle: &str) -> CheckoutResult<PaymentSnapshot>;

    async fn cancel_payment(&self, payment_id: &str, reason: &str) -> CheckoutResult<()>;

    /// Stop the subscription from renewing at the end of the current term
    async fn cancel_renewal(&self, reason: &str) -> CheckoutResult<()>;

    /// Remove a card by `payId` when known, else by billing key
    async fn remove_card(&self, card: &CardOption) -> CheckoutResult<()> {
        if let Some(ref pay_id) = card.pay_id {
            return self.delete_billing_key_by_id(pay_id).await;
        }
        if let Some(ref billing_key) = card.billing_key {
            return self.delete_billing_key(billing_key).await;
        }
        Err(CheckoutError::InvalidRequest(
            "Either payId or billingKey is required".to_string(),
        ))
    }
}

/// Type alias for a shared backend (dynamic dispatch)
pub type SharedBackend = Arc<dyn BackendApi>;
