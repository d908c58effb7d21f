//! # Response Field Mapping
//!
//! The backend's field naming is not stable across endpoints and releases.
//! Every ordered fallback list lives here; the rest of the workspace only
//! sees the canonical types from `checkout_core`.

use checkout_core::{
    CardOption, ConfirmedBillingKey, PaymentConfirmation, PaymentSnapshot, SubscriptionInvoice,
};
use serde_json::Value;

/// Invoice id on a subscription-start response
pub const INVOICE_ID: &[&str] = &["invoiceId", "id", "piId", "pi_id"];

/// Payment id on confirm and status responses
pub const PAYMENT_ID: &[&str] = &["paymentId", "id", "payment_id"];

/// Order id on confirm responses, used when no payment id is present
pub const ORDER_ID: &[&str] = &["orderId", "invoiceId", "order_id"];

/// Status word on status responses
pub const STATUS: &[&str] = &["status", "result"];

/// Invoice id echoed on status responses
pub const STATUS_INVOICE_ID: &[&str] = &["invoiceId", "invoice_id"];

pub const BILLING_KEY: &[&str] = &["billingKey"];

pub const CARD_PAY_ID: &[&str] = &["payId", "id"];
pub const CARD_BILLING_KEY: &[&str] = &["billingKey", "key"];
pub const CARD_BRAND: &[&str] = &["brand", "issuerName"];
pub const CARD_BIN: &[&str] = &["bin"];
pub const CARD_LAST4: &[&str] = &["last4"];
pub const CARD_PG: &[&str] = &["pg", "pgProvider"];

/// Human-readable message on error bodies
pub const ERROR_MESSAGE: &[&str] = &["error", "message", "detail", "msg", "reason"];

/// First non-empty value among `keys`. Numbers are stringified.
pub fn pick_string(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match value.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Boolean flag, accepting `true` and `"true"`
pub fn pick_bool(value: &Value, key: &str) -> bool {
    match value.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

pub fn card_option(value: &Value) -> CardOption {
    CardOption {
        pay_id: pick_string(value, CARD_PAY_ID),
        billing_key: pick_string(value, CARD_BILLING_KEY),
        brand: pick_string(value, CARD_BRAND),
        bin: pick_string(value, CARD_BIN),
        last4: pick_string(value, CARD_LAST4),
        pg: pick_string(value, CARD_PG),
    }
}

/// Card list; anything but a JSON array is treated as no cards
pub fn card_options(value: &Value) -> Vec<CardOption> {
    value
        .as_array()
        .map(|items| items.iter().map(card_option).collect())
        .unwrap_or_default()
}

pub fn invoice(value: Value) -> SubscriptionInvoice {
    SubscriptionInvoice {
        invoice_id: pick_string(&value, INVOICE_ID),
        raw: value,
    }
}

pub fn confirmation(value: &Value) -> PaymentConfirmation {
    PaymentConfirmation {
        success: pick_bool(value, "success"),
        payment_id: pick_string(value, PAYMENT_ID),
        order_id: pick_string(value, ORDER_ID),
        message: pick_string(value, &["message"]),
    }
}

pub fn snapshot(value: &Value) -> PaymentSnapshot {
    let status = pick_string(value, STATUS).unwrap_or_default();
    PaymentSnapshot {
        payment_id: pick_string(value, PAYMENT_ID),
        invoice_id: pick_string(value, STATUS_INVOICE_ID),
        ..PaymentSnapshot::new(&status, pick_bool(value, "done"))
    }
}

pub fn confirmed_billing_key(value: Value) -> ConfirmedBillingKey {
    ConfirmedBillingKey {
        billing_key: pick_string(&value, BILLING_KEY),
        raw: value,
    }
}

/// Message for a non-2xx response: a plain-text body, a known message
/// field, or `HTTP <status>`.
pub fn error_message(body: &str, status: u16) -> String {
    let trimmed = body.trim();
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::String(s)) if !s.is_empty() => s,
        Ok(value @ Value::Object(_)) => {
            pick_string(&value, ERROR_MESSAGE).unwrap_or_else(|| format!("HTTP {}", status))
        }
        Ok(_) => format!("HTTP {}", status),
        Err(_) if !trimmed.is_empty() && !trimmed.starts_with('<') => trimmed.to_string(),
        Err(_) => format!("HTTP {}", status),
    }
}
