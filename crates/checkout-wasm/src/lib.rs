//! # checkout-wasm
//!
//! WebAssembly bindings for plan-checkout.
//!
//! This crate provides:
//! - `BrowserSessionStorage`: `window.sessionStorage` as a [`SessionStorage`]
//! - `BrowserNavigator`: `window.location` as a [`Navigator`]
//! - JS exports of the redirect-parameter, backoff and routing helpers
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { redirect_params, poll_interval_ms, checkout_return_url } from 'plan-checkout-wasm';
//!
//! await init();
//!
//! const params = redirect_params(window.location.href);
//! setTimeout(poll, poll_interval_ms(elapsedSecs));
//! window.location.href = checkout_return_url(window.location.href);
//! ```
//!
//! ## Building
//!
//! ```bash
//! wasm-pack build --target web
//! ```

use checkout_core::navigation::billing_key_redirect_url;
use checkout_core::{CheckoutContextStore, Navigator, RedirectParams, SessionStorage};
use std::collections::BTreeMap;
use std::sync::Arc;
use wasm_bindgen::prelude::*;

/// `window.sessionStorage`. Every storage failure is ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserSessionStorage;

impl BrowserSessionStorage {
    fn storage() -> Option<web_sys::Storage> {
        web_sys::window()?.session_storage().ok()?
    }
}

impl SessionStorage for BrowserSessionStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        Self::storage()?.get_item(key).ok()?
    }

    fn set_item(&self, key: &str, value: &str) {
        if let Some(storage) = Self::storage() {
            let _ = storage.set_item(key, value);
        }
    }

    fn remove_item(&self, key: &str) {
        if let Some(storage) = Self::storage() {
            let _ = storage.remove_item(key);
        }
    }
}

/// `window.location`.
///
/// Root-relative routes such as `/sub/me` are hash-router routes and
/// become `#/sub/me`; anything else replaces the whole location.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserNavigator;

impl Navigator for BrowserNavigator {
    fn current_href(&self) -> String {
        web_sys::window()
            .and_then(|w| w.location().href().ok())
            .unwrap_or_default()
    }

    fn navigate(&self, url: &str) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let location = window.location();
        let result = match hash_route(url) {
            Some(route) => location.set_hash(route),
            None => location.set_href(url),
        };
        if let Err(e) = result {
            web_sys::console::error_2(&JsValue::from_str("navigation failed"), &e);
        }
    }
}

fn hash_route(url: &str) -> Option<&str> {
    if url.starts_with('/') && !url.starts_with("//") && !url.starts_with("/#") {
        Some(url)
    } else {
        None
    }
}

/// Recovery store backed by the tab's session storage
pub fn browser_context_store() -> CheckoutContextStore {
    CheckoutContextStore::new(Arc::new(BrowserSessionStorage))
}

// =============================================================================
// JS exports
// =============================================================================

/// Merged query, fragment-query and `#/?` parameters of `href`, as a plain object
#[wasm_bindgen]
pub fn redirect_params(href: &str) -> Result<JsValue, JsValue> {
    let params = RedirectParams::from_url(href);
    let sorted: BTreeMap<&str, &str> = params.iter().collect();
    serde_wasm_bindgen::to_value(&sorted)
        .map_err(|e| JsValue::from_str(&format!("Cannot convert parameters: {}", e)))
}

/// Delay before the next status lookup, given seconds since polling began
#[wasm_bindgen]
pub fn poll_interval_ms(elapsed_secs: u32) -> u32 {
    checkout_core::poll_interval(u64::from(elapsed_secs)).as_millis() as u32
}

#[wasm_bindgen]
pub fn is_success_status(status: &str) -> bool {
    checkout_core::is_success_status(status)
}

#[wasm_bindgen]
pub fn is_placeholder_billing_key(key: &str) -> bool {
    checkout_core::is_placeholder_billing_key(key)
}

/// Result-view route for a terminal poll
#[wasm_bindgen]
pub fn result_route(invoice_id: Option<String>, payment_id: &str, status: &str) -> String {
    checkout_core::result_route(invoice_id.as_deref(), payment_id, status)
}

/// Redirect-landing URL to hand to the gateway SDK
#[wasm_bindgen]
pub fn billing_key_redirect(origin: &str) -> String {
    billing_key_redirect_url(origin)
}

/// Store the current page as the checkout to come back to
#[wasm_bindgen]
pub fn remember_checkout_page() {
    browser_context_store().remember_page(&BrowserNavigator.current_href());
}

/// Same-origin URL of the checkout the shopper left from
#[wasm_bindgen]
pub fn checkout_return_url(current_href: &str) -> Option<String> {
    browser_context_store().get().return_url(current_href)
}

/// Invoice id of the checkout in flight, if one was stored
#[wasm_bindgen]
pub fn pending_invoice_id() -> Option<String> {
    browser_context_store()
        .pending_invoice()
        .map(|id| id.to_string())
}

/// Get library version
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_interval_ms() {
        assert_eq!(poll_interval_ms(0), 2_000);
        assert_eq!(poll_interval_ms(59), 2_000);
        assert_eq!(poll_interval_ms(60), 5_000);
        assert_eq!(poll_interval_ms(299), 5_000);
        assert_eq!(poll_interval_ms(300), 15_000);
    }

    #[test]
    fn test_hash_route() {
        assert_eq!(hash_route("/sub/me"), Some("/sub/me"));
        assert_eq!(hash_route("/#/plan/checkout"), None);
        assert_eq!(hash_route("//evil.example.net/"), None);
        assert_eq!(hash_route("https://shop.example.com/#/plan/checkout"), None);
    }

    #[test]
    fn test_result_route_export() {
        assert_eq!(
            result_route(Some("1001".into()), "p1", "PAID"),
            "/plan/checkout/result?invoiceId=1001&paymentId=p1&status=PAID"
        );
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod browser_tests {
    use super::*;
    use checkout_core::context::LAST_CHECKOUT_URL_KEY;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_session_storage_round_trip() {
        let storage = BrowserSessionStorage;
        storage.set_item(LAST_CHECKOUT_URL_KEY, "https://shop.example.com/#/plan/checkout");
        assert_eq!(
            storage.get_item(LAST_CHECKOUT_URL_KEY).as_deref(),
            Some("https://shop.example.com/#/plan/checkout")
        );
        storage.remove_item(LAST_CHECKOUT_URL_KEY);
        assert_eq!(storage.get_item(LAST_CHECKOUT_URL_KEY), None);
    }
}
