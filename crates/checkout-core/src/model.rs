//! # Checkout Data Model
//!
//! Billing-key issuance attempts, payment attempts, card options and the
//! plan selection a checkout is started with.

use crate::error::{CheckoutError, CheckoutResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix the gateway puts on an issuance token when it echoes one in the
/// `billingKey` field. Such a value is not a usable billing key yet.
pub const PLACEHOLDER_KEY_PREFIX: &str = "billing-issue-token";

/// Payment statuses that count as a successful charge
pub const SUCCESS_STATUSES: &[&str] = &["PAID", "SUCCEEDED", "SUCCESS", "PARTIAL_PAID"];

/// Returns true if `key` is the issuance-token placeholder rather than a real key
pub fn is_placeholder_billing_key(key: &str) -> bool {
    key.starts_with(PLACEHOLDER_KEY_PREFIX)
}

/// Trim and uppercase a status word as returned by the backend or gateway
pub fn normalize_status(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Membership test against [`SUCCESS_STATUSES`], after normalization
pub fn is_success_status(status: &str) -> bool {
    let status = normalize_status(status);
    SUCCESS_STATUSES.contains(&status.as_str())
}

// =============================================================================
// Billing key issuance
// =============================================================================

/// Status of one billing-key issuance call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssuanceStatus {
    Issued,
    NeedsConfirmation,
    Canceled,
    Failed,
    Unknown,
}

impl IssuanceStatus {
    /// Parse a gateway status word; anything unrecognized is `Unknown`
    pub fn parse(raw: &str) -> Self {
        match normalize_status(raw).as_str() {
            "ISSUED" => IssuanceStatus::Issued,
            "NEEDS_CONFIRMATION" => IssuanceStatus::NeedsConfirmation,
            "CANCELED" | "CANCELLED" => IssuanceStatus::Canceled,
            "FAILED" => IssuanceStatus::Failed,
            _ => IssuanceStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IssuanceStatus::Issued => "ISSUED",
            IssuanceStatus::NeedsConfirmation => "NEEDS_CONFIRMATION",
            IssuanceStatus::Canceled => "CANCELED",
            IssuanceStatus::Failed => "FAILED",
            IssuanceStatus::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for IssuanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// In-memory record of a single issuance call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuanceAttempt {
    /// Opaque token returned when identity confirmation is required
    pub billing_issue_token: Option<String>,

    /// Status-like signal (from `status`, or echoed in `billingKey`)
    pub status: IssuanceStatus,

    /// Confirmed billing key; never a placeholder
    pub billing_key: Option<String>,
}

impl IssuanceAttempt {
    /// Build an attempt from the raw fields the gateway handed back.
    ///
    /// Some gateways echo a status word in the `billingKey` field, so the
    /// key doubles as a status source when `status` is empty. A placeholder
    /// key is dropped.
    pub fn from_raw(
        status: Option<&str>,
        billing_key: Option<&str>,
        billing_issue_token: Option<&str>,
    ) -> Self {
        let status_like = status
            .filter(|s| !s.trim().is_empty())
            .or(billing_key)
            .unwrap_or_default();

        let billing_key = billing_key
            .filter(|k| !k.is_empty() && !is_placeholder_billing_key(k))
            .map(String::from);

        Self {
            billing_issue_token: billing_issue_token
                .filter(|t| !t.is_empty())
                .map(String::from),
            status: IssuanceStatus::parse(status_like),
            billing_key,
        }
    }

    /// A key that may be registered right away
    pub fn registrable_key(&self) -> Option<&str> {
        match self.status {
            IssuanceStatus::NeedsConfirmation => None,
            _ => self.billing_key.as_deref(),
        }
    }

    /// Token to carry through the identity-confirmation redirect
    pub fn confirmation_token(&self) -> Option<&str> {
        match self.status {
            IssuanceStatus::NeedsConfirmation => self.billing_issue_token.as_deref(),
            _ => None,
        }
    }
}

// =============================================================================
// Payment attempts
// =============================================================================

/// Canonical view of one payment status lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSnapshot {
    /// Normalized (uppercase) status; `UNKNOWN` when the backend sent none
    pub status: String,

    /// Backend says the attempt has reached a terminal state
    pub done: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_id: Option<String>,
}

impl PaymentSnapshot {
    pub fn new(status: &str, done: bool) -> Self {
        let status = normalize_status(status);
        Self {
            status: if status.is_empty() {
                "UNKNOWN".to_string()
            } else {
                status
            },
            done,
            payment_id: None,
            invoice_id: None,
        }
    }

    pub fn with_payment_id(mut self, payment_id: impl Into<String>) -> Self {
        self.payment_id = Some(payment_id.into());
        self
    }

    pub fn with_invoice_id(mut self, invoice_id: impl Into<String>) -> Self {
        self.invoice_id = Some(invoice_id.into());
        self
    }

    pub fn is_success(&self) -> bool {
        is_success_status(&self.status)
    }
}

/// A payment attempt being tracked for one checkout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentAttempt {
    /// Identifier used for status lookups (payment id preferred, else order id)
    pub handle: String,
    pub status: String,
    pub elapsed_secs: u64,
    pub done: bool,
}

impl PaymentAttempt {
    pub fn new(handle: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            status: "PENDING".to_string(),
            elapsed_secs: 0,
            done: false,
        }
    }

    /// Fold a status lookup into the attempt
    pub fn observe(&mut self, snapshot: &PaymentSnapshot) {
        self.status = snapshot.status.clone();
        self.done = snapshot.done;
    }

    pub fn is_success(&self) -> bool {
        is_success_status(&self.status)
    }
}

/// Validated invoice identifier: a positive integer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceId(u64);

impl InvoiceId {
    /// Parse an invoice id, rejecting `"null"`, `"undefined"`, empty, NaN,
    /// zero, negative and non-integer values.
    pub fn parse(raw: &str) -> CheckoutResult<Self> {
        let trimmed = raw.trim();
        match trimmed.parse::<u64>() {
            Ok(value) if value > 0 => Ok(Self(value)),
            _ => Err(CheckoutError::MalformedInvoiceId {
                value: raw.to_string(),
            }),
        }
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl From<u64> for InvoiceId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Cards
// =============================================================================

/// A registered billing key as offered for selection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardOption {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pay_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last4: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pg: Option<String>,
}

impl CardOption {
    /// Charge target for this card; `payId` is preferred over the raw key
    pub fn payment_source(&self) -> Option<PaymentSource> {
        if let Some(ref pay_id) = self.pay_id {
            return Some(PaymentSource::PayId(pay_id.clone()));
        }
        self.billing_key
            .as_ref()
            .map(|key| PaymentSource::BillingKey(key.clone()))
    }

    /// Whether the card can be charged at all
    pub fn is_usable(&self) -> bool {
        self.payment_source().is_some()
    }

    /// Masked card number plus provider, e.g. `411111-****-****-1234 · tosspayments`
    pub fn display_label(&self) -> String {
        let mut label = match (&self.bin, &self.last4) {
            (Some(bin), last4) => format!(
                "{}-****-****-{}",
                bin,
                last4.as_deref().unwrap_or("****")
            ),
            (None, Some(last4)) => format!("****-****-****-{}", last4),
            (None, None) => String::new(),
        };
        if let Some(ref pg) = self.pg {
            if !label.is_empty() {
                label.push_str(" · ");
            }
            label.push_str(pg);
        }
        label
    }

    /// Card details are only known after the first successful charge
    pub fn details_pending(&self) -> bool {
        self.brand.is_none() || self.last4.is_none()
    }
}

/// What a subscription charge is drawn from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PaymentSource {
    PayId(String),
    BillingKey(String),
}

// =============================================================================
// Plan selection
// =============================================================================

/// Plan code and term a checkout was opened for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSelection {
    pub plan_code: String,
    pub months: u32,
}

impl PlanSelection {
    pub fn new(plan_code: impl Into<String>, months: u32) -> Self {
        Self {
            plan_code: plan_code.into(),
            months: months.max(1),
        }
    }

    /// Read `code`/`planCode` and `months`/`term` from a checkout query string.
    ///
    /// The term defaults to one month when missing, zero or not a number.
    pub fn from_query(query: &str) -> Self {
        let pairs: Vec<(String, String)> =
            url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
                .into_owned()
                .collect();
        let get = |key: &str| {
            pairs
                .iter()
                .find(|(k, v)| k == key && !v.is_empty())
                .map(|(_, v)| v.clone())
        };

        let plan_code = get("code").or_else(|| get("planCode")).unwrap_or_default();
        let months = get("months")
            .or_else(|| get("term"))
            .and_then(|m| m.trim().parse::<u32>().ok())
            .filter(|m| *m > 0)
            .unwrap_or(1);

        Self {
            plan_code: plan_code.trim().to_string(),
            months,
        }
    }
}
