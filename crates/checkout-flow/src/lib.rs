//! # checkout-flow
//!
//! The plan-checkout flows, driven against the collaborator traits from
//! `checkout-core`:
//!
//! - [`BillingKeyIssuer`]: gateway issuance and registration
//! - [`RedirectConfirmationHandler`]: identity-confirmation landing page
//! - [`CheckoutFlow`] / [`PaymentPoller`]: invoice, confirm, poll
//! - [`ResultFinalizer`]: payment result page
//! - [`CardWallet`]: card list and removal
//!
//! ## Example
//!
//! ```rust,ignore
//! use checkout_flow::{CheckoutFlow, CheckoutOutcome};
//!
//! let flow = CheckoutFlow::new(backend, store, navigator);
//! flow.mount();
//!
//! match flow.run(&plan, wallet.selected().unwrap()).await {
//!     CheckoutOutcome::Completed { route, .. } => println!("-> {}", route),
//!     CheckoutOutcome::Aborted { message, .. } => eprintln!("{}", message),
//!     CheckoutOutcome::Canceled => {}
//! }
//! ```

pub mod cards;
pub mod checkout;
pub mod config;
pub mod finalizer;
pub mod issuer;
pub mod poller;
pub mod redirect;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports
pub use cards::CardWallet;
pub use checkout::{CheckoutFlow, CheckoutOutcome, CheckoutState};
pub use config::GatewayConfig;
pub use finalizer::{FinalizeOutcome, ResultFinalizer};
pub use issuer::{BillingKeyIssuer, IssuanceOutcome};
pub use poller::{PaymentPoller, PollOutcome, PollProgress, PollSession};
pub use redirect::{RedirectConfirmationHandler, RedirectOutcome};
