//! # checkout-backend
//!
//! REST client for the payment/subscription backend.
//!
//! `HttpBackend` implements [`checkout_core::BackendApi`] with reqwest and
//! maps the backend's unstable response field names (see [`fields`]) onto
//! the canonical core types.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use checkout_backend::HttpBackend;
//! use checkout_core::BackendApi;
//!
//! // Create client from environment (API_BASE_URL, API_TIMEOUT_SECS)
//! let backend = HttpBackend::from_env()?;
//!
//! // Look up a payment
//! let snapshot = backend.payment_status("pay_123").await?;
//! if snapshot.done && snapshot.is_success() {
//!     println!("paid");
//! }
//! ```

pub mod client;
pub mod config;
pub mod fields;

// Re-exports
pub use client::HttpBackend;
pub use config::BackendConfig;
