//! # checkout-cli
//!
//! Support code for the `plan-checkout` binary: settings loading and a
//! terminal [`checkout_core::Navigator`].

pub mod console;
pub mod settings;

pub use console::{card_line, ConsoleNavigator};
pub use settings::Settings;
