//! # checkout-core
//!
//! Core types and traits for the plan-checkout payment confirmation workflow.
//!
//! This crate provides:
//! - `BackendApi` and `BillingGateway` traits for the external services
//! - `Navigator` and `SessionStorage` traits for the browser surface
//! - `CheckoutContextStore` for recovery across external redirects
//! - `RedirectParams` for reading gateway redirect parameters
//! - `poll_interval` for the elapsed-time poll backoff
//! - `CheckoutError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use checkout_core::{CheckoutContextStore, RedirectParams, poll_interval};
//!
//! // Remember the checkout page before leaving for the gateway
//! store.remember_page(&navigator.current_href());
//!
//! // On return, read parameters from wherever the gateway put them
//! let params = RedirectParams::from_url(&navigator.current_href());
//! let token = params.pick(checkout_core::params::keys::ISSUE_TOKEN);
//! ```

pub mod backend;
pub mod backoff;
pub mod context;
pub mod error;
pub mod gateway;
pub mod model;
pub mod navigation;
pub mod params;

// Re-exports for convenience
pub use backend::{
    BackendApi, ConfirmPayment, ConfirmedBillingKey, PaymentConfirmation, RegisterBillingKey,
    SharedBackend, StartSubscription, SubscriptionInvoice,
};
pub use backoff::poll_interval;
pub use context::{CheckoutContext, CheckoutContextStore, MemorySessionStorage, SessionStorage};
pub use error::{CheckoutError, CheckoutResult, ErrorKind};
pub use gateway::{BillingGateway, BillingPaymentRequest, GatewayResponse, IssueBillingKeyRequest};
pub use model::{
    is_placeholder_billing_key, is_success_status, normalize_status, CardOption, InvoiceId,
    IssuanceAttempt, IssuanceStatus, PaymentAttempt, PaymentSnapshot, PaymentSource,
    PlanSelection,
};
pub use navigation::{result_route, Navigator};
pub use params::RedirectParams;
