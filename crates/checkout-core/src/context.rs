//! # Checkout Recovery Context
//!
//! Tab-scoped storage of where the shopper was before leaving for the
//! gateway, plus the invoice id the result page may need after a redirect.
//!
//! Writes are last-write-wins. The context is written on every checkout
//! mount and before every issuance attempt, and read only when returning
//! from the redirect-landing page.

use crate::model::InvoiceId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use url::Url;

/// Session key holding the full checkout URL
pub const LAST_CHECKOUT_URL_KEY: &str = "lastCheckoutUrl";

/// Session key holding the checkout query string (with leading `?`)
pub const LAST_CHECKOUT_QUERY_KEY: &str = "lastCheckoutQuery";

/// Session key holding the invoice id of the running checkout
pub const LAST_INVOICE_ID_KEY: &str = "lastInvoiceId";

/// Router path of the checkout page, used when the stored URL is unusable
pub const CHECKOUT_FALLBACK_PATH: &str = "/#/plan/checkout";

/// Raw string key/value storage that survives reloads within one tab.
///
/// Browser `sessionStorage` in production, [`MemorySessionStorage`] in
/// tests and native tools. Storage failures are swallowed by implementors.
pub trait SessionStorage {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: &str);
    fn remove_item(&self, key: &str);
}

/// In-process [`SessionStorage`]
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStorage {
    items: Arc<Mutex<HashMap<String, String>>>,
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemorySessionStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items
            .lock()
            .ok()
            .and_then(|items| items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) {
        if let Ok(mut items) = self.items.lock() {
            items.insert(key.to_string(), value.to_string());
        }
    }

    fn remove_item(&self, key: &str) {
        if let Ok(mut items) = self.items.lock() {
            items.remove(key);
        }
    }
}

/// Where the shopper was when an external redirect started
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutContext {
    pub last_checkout_url: Option<String>,
    pub last_checkout_query: Option<String>,
}

impl CheckoutContext {
    /// Capture the context of a page URL
    pub fn from_page(href: &str) -> Self {
        let query = Url::parse(href)
            .ok()
            .and_then(|u| u.query().map(|q| format!("?{}", q)))
            .unwrap_or_default();
        Self {
            last_checkout_url: Some(href.to_string()),
            last_checkout_query: Some(query),
        }
    }

    /// URL to send the shopper back to, given the page they are on now.
    ///
    /// The stored URL is used only when it has the same origin as
    /// `current_href`; otherwise the checkout route is rebuilt under the
    /// current origin from the stored query. The result is never on a
    /// foreign origin.
    pub fn return_url(&self, current_href: &str) -> Option<String> {
        let current = Url::parse(current_href).ok()?;
        let origin = current.origin();

        if let Some(ref last) = self.last_checkout_url {
            if let Ok(stored) = Url::parse(last) {
                if origin.is_tuple() && stored.origin() == origin {
                    return Some(stored.to_string());
                }
            }
        }

        let query = self.last_checkout_query.as_deref().unwrap_or_default();
        let query = if query.is_empty() || query.starts_with('?') {
            query.to_string()
        } else {
            format!("?{}", query)
        };

        Some(format!(
            "{}{}{}",
            origin.ascii_serialization(),
            CHECKOUT_FALLBACK_PATH,
            query
        ))
    }
}

/// Typed access to the recovery keys in a [`SessionStorage`]
#[derive(Clone)]
pub struct CheckoutContextStore {
    storage: Arc<dyn SessionStorage>,
}

impl CheckoutContextStore {
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self { storage }
    }

    /// Store backed by a fresh [`MemorySessionStorage`]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemorySessionStorage::new()))
    }

    pub fn get(&self) -> CheckoutContext {
        CheckoutContext {
            last_checkout_url: self.storage.get_item(LAST_CHECKOUT_URL_KEY),
            last_checkout_query: self.storage.get_item(LAST_CHECKOUT_QUERY_KEY),
        }
    }

    pub fn set(&self, context: &CheckoutContext) {
        if let Some(ref url) = context.last_checkout_url {
            self.storage.set_item(LAST_CHECKOUT_URL_KEY, url);
        }
        self.storage.set_item(
            LAST_CHECKOUT_QUERY_KEY,
            context.last_checkout_query.as_deref().unwrap_or_default(),
        );
    }

    /// Record the current page as the checkout to come back to
    pub fn remember_page(&self, href: &str) {
        self.set(&CheckoutContext::from_page(href));
    }

    pub fn clear(&self) {
        self.storage.remove_item(LAST_CHECKOUT_URL_KEY);
        self.storage.remove_item(LAST_CHECKOUT_QUERY_KEY);
    }

    /// Invoice id of the checkout in flight, if one was stored and is well formed
    pub fn pending_invoice(&self) -> Option<InvoiceId> {
        self.storage
            .get_item(LAST_INVOICE_ID_KEY)
            .and_then(|raw| InvoiceId::parse(&raw).ok())
    }

    pub fn set_pending_invoice(&self, invoice_id: InvoiceId) {
        self.storage
            .set_item(LAST_INVOICE_ID_KEY, &invoice_id.to_string());
    }

    pub fn clear_pending_invoice(&self) {
        self.storage.remove_item(LAST_INVOICE_ID_KEY);
    }
}

impl std::fmt::Debug for CheckoutContextStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutContextStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CURRENT: &str = "https://shop.example.com/?transactionType=ISSUE_BILLING_KEY#/billing-keys/redirect";

    #[test]
    fn test_context_from_page() {
        let ctx = CheckoutContext::from_page("https://shop.example.com/?code=PRO&months=3#/plan/checkout");
        assert_eq!(ctx.last_checkout_query.as_deref(), Some("?code=PRO&months=3"));

        let ctx = CheckoutContext::from_page("https://shop.example.com/#/plan/checkout");
        assert_eq!(ctx.last_checkout_query.as_deref(), Some(""));
    }

    #[test]
    fn test_return_url_same_origin() {
        let ctx = CheckoutContext {
            last_checkout_url: Some("https://shop.example.com/#/plan/checkout/PRO/3".into()),
            last_checkout_query: Some("?code=PRO".into()),
        };
        assert_eq!(
            ctx.return_url(CURRENT).unwrap(),
            "https://shop.example.com/#/plan/checkout/PRO/3"
        );
    }

    #[test]
    fn test_return_url_never_leaves_origin() {
        let stored = [
            "https://evil.example.net/#/plan/checkout",
            "https://shop.example.com.evil.net/#/plan/checkout",
            "http://shop.example.com/#/plan/checkout",
            "https://shop.example.com:8443/#/plan/checkout",
            "javascript:alert(1)",
            "not a url",
            "",
        ];
        for last in stored {
            let ctx = CheckoutContext {
                last_checkout_url: Some(last.to_string()),
                last_checkout_query: Some("?code=PRO".into()),
            };
            let target = ctx.return_url(CURRENT).unwrap();
            assert_eq!(
                target, "https://shop.example.com/#/plan/checkout?code=PRO",
                "stored {last:?}"
            );
            let parsed = Url::parse(&target).unwrap();
            assert_eq!(parsed.origin(), Url::parse(CURRENT).unwrap().origin());
        }
    }

    #[test]
    fn test_return_url_without_context() {
        let ctx = CheckoutContext::default();
        assert_eq!(
            ctx.return_url(CURRENT).unwrap(),
            "https://shop.example.com/#/plan/checkout"
        );

        let ctx = CheckoutContext {
            last_checkout_url: None,
            last_checkout_query: Some("months=6".into()),
        };
        assert_eq!(
            ctx.return_url(CURRENT).unwrap(),
            "https://shop.example.com/#/plan/checkout?months=6"
        );
    }

    #[test]
    fn test_store_round_trip_and_overwrite() {
        let store = CheckoutContextStore::in_memory();
        assert_eq!(store.get(), CheckoutContext::default());

        store.remember_page("https://shop.example.com/?code=A#/plan/checkout");
        store.remember_page("https://shop.example.com/?code=B#/plan/checkout");
        let ctx = store.get();
        assert_eq!(ctx.last_checkout_query.as_deref(), Some("?code=B"));

        store.clear();
        assert_eq!(store.get(), CheckoutContext::default());
    }

    #[test]
    fn test_pending_invoice() {
        let storage = Arc::new(MemorySessionStorage::new());
        let store = CheckoutContextStore::new(storage.clone());

        storage.set_item(LAST_INVOICE_ID_KEY, "undefined");
        assert_eq!(store.pending_invoice(), None);

        store.set_pending_invoice(InvoiceId::from(1001));
        assert_eq!(store.pending_invoice(), Some(InvoiceId::from(1001)));

        store.clear_pending_invoice();
        store.clear_pending_invoice();
        assert_eq!(storage.get_item(LAST_INVOICE_ID_KEY), None);
    }
}
