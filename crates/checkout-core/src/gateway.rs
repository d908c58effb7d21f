//! # Billing Gateway Trait
//!
//! Billing-key issuance through the third-party payment gateway SDK.
//! Two SDK capabilities lead to the same logical outcome: the dedicated
//! "issue billing key" call, and a generic payment request in BILLING mode.

use crate::error::CheckoutResult;
use crate::model::IssuanceAttempt;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Parameters of the dedicated issue-billing-key call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueBillingKeyRequest {
    pub store_id: String,
    pub channel_key: String,
    pub redirect_url: String,
    pub billing_key_method: String,
}

/// Parameters of the payment-request fallback in BILLING mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingPaymentRequest {
    pub store_id: String,
    pub channel_key: String,
    /// Synthetic order reference, e.g. `bk_1718000000000`
    pub payment_id: String,
    pub order_name: String,
    pub total_amount: i64,
    pub currency: String,
    pub customer_id: String,
    pub method: String,
    pub redirect_url: String,
}

/// What the SDK handed back, whichever call produced it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_issue_token: Option<String>,
    /// SDK error code, set when the shopper aborted or the gateway failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Every other field the SDK returned, kept for the registration audit trail
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl GatewayResponse {
    pub fn from_json(value: serde_json::Value) -> CheckoutResult<Self> {
        serde_json::from_value(value)
            .map_err(|e| crate::CheckoutError::Serialization(format!("Gateway response: {}", e)))
    }

    /// Interpret the response as an issuance attempt
    pub fn attempt(&self) -> IssuanceAttempt {
        IssuanceAttempt::from_raw(
            self.status.as_deref(),
            self.billing_key.as_deref(),
            self.billing_issue_token.as_deref(),
        )
    }
}

/// Payment gateway SDK.
#[async_trait]
pub trait BillingGateway: Send + Sync {
    /// Whether the SDK exposes the dedicated issue-billing-key call
    fn supports_issue_billing_key(&self) -> bool {
        true
    }

    async fn request_issue_billing_key(
        &self,
        request: &IssueBillingKeyRequest,
    ) -> CheckoutResult<GatewayResponse>;

    async fn request_billing_payment(
        &self,
        request: &BillingPaymentRequest,
    ) -> CheckoutResult<GatewayResponse>;

    /// Gateway name (for logging)
    fn gateway_name(&self) -> &'static str;
}
