//! # Redirect Parameters
//!
//! The gateway may hand parameters back through the query string, through
//! a query string inside the URL fragment, or through a router-style
//! `#/?` fragment. All three are merged into one map before any field is
//! read; later sources override earlier ones.

use std::collections::HashMap;
use url::Url;

/// Merged view of every parameter on a landing URL
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedirectParams {
    values: HashMap<String, String>,
}

impl RedirectParams {
    /// Merge query, fragment-query and `#/?` parameters of `href`.
    ///
    /// An unparsable URL yields an empty parameter set.
    pub fn from_url(href: &str) -> Self {
        match Url::parse(href) {
            Ok(url) => Self::from_parsed(&url),
            Err(_) => Self::default(),
        }
    }

    pub fn from_parsed(url: &Url) -> Self {
        let mut params = Self::default();

        // 1. standard query string
        params.merge_query(url.query().unwrap_or_default());

        let fragment = url.fragment().unwrap_or_default();

        // 2. query string embedded after `?` inside the fragment
        if let Some(idx) = fragment.find('?') {
            params.merge_query(&fragment[idx + 1..]);
        }

        // 3. router encoding: `#/?key=value`
        if let Some(rest) = fragment.strip_prefix("/?") {
            params.merge_query(rest);
        }

        params
    }

    /// Parse a bare query string (leading `?` optional)
    pub fn from_query(query: &str) -> Self {
        let mut params = Self::default();
        params.merge_query(query);
        params
    }

    fn merge_query(&mut self, query: &str) {
        let query = query.strip_prefix('?').unwrap_or(query);
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            self.values.insert(key.into_owned(), value.into_owned());
        }
    }

    /// Raw value of a single key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// First non-empty value among `keys`, in priority order
    pub fn pick(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|key| self.get(key))
            .find(|value| !value.is_empty())
    }

    /// Like [`pick`](Self::pick), uppercased; empty string when nothing matched
    pub fn pick_upper(&self, keys: &[&str]) -> String {
        self.pick(keys).map(str::to_uppercase).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Fields the billing-key landing page looks for, in priority order
pub mod keys {
    pub const TRANSACTION_TYPE: &[&str] = &["transactionType", "txType"];
    pub const STATUS: &[&str] = &["status", "result"];
    pub const STATUS_ECHO: &[&str] = &["billingKey"];
    pub const ISSUE_TOKEN: &[&str] = &["billingIssueToken", "issueToken", "token"];

    pub const ERROR_CODE: &[&str] = &["code"];
    pub const ERROR_MESSAGE: &[&str] = &["message"];
    pub const INVOICE_ID: &[&str] = &["invoiceId"];
    pub const PAYMENT_ID: &[&str] = &["paymentId"];
    pub const AMOUNT: &[&str] = &["amount"];
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: &str = "https://shop.example.com";

    #[test]
    fn test_each_source_alone_resolves_same_values() {
        let urls = [
            format!("{ORIGIN}/?status=NEEDS_CONFIRMATION&billingIssueToken=tok#/billing-keys/redirect"),
            format!("{ORIGIN}/#/billing-keys/redirect?status=NEEDS_CONFIRMATION&billingIssueToken=tok"),
            format!("{ORIGIN}/#/?status=NEEDS_CONFIRMATION&billingIssueToken=tok"),
        ];
        for href in &urls {
            let params = RedirectParams::from_url(href);
            assert_eq!(params.pick(keys::STATUS), Some("NEEDS_CONFIRMATION"), "{href}");
            assert_eq!(params.pick(keys::ISSUE_TOKEN), Some("tok"), "{href}");
        }
    }

    #[test]
    fn test_fragment_overrides_query() {
        let href = format!("{ORIGIN}/?status=FAILED&txType=X#/redirect?status=ISSUED");
        let params = RedirectParams::from_url(&href);
        assert_eq!(params.get("status"), Some("ISSUED"));
        assert_eq!(params.get("txType"), Some("X"));
    }

    #[test]
    fn test_router_fragment_overrides_query() {
        let href = format!("{ORIGIN}/?result=FAILED#/?result=CANCELED");
        let params = RedirectParams::from_url(&href);
        assert_eq!(params.get("result"), Some("CANCELED"));
    }

    #[test]
    fn test_pick_skips_empty_values() {
        let params = RedirectParams::from_query("?transactionType=&txType=issue_billing_key");
        assert_eq!(params.pick(keys::TRANSACTION_TYPE), Some("issue_billing_key"));
        assert_eq!(params.pick_upper(keys::TRANSACTION_TYPE), "ISSUE_BILLING_KEY");
        assert_eq!(params.pick_upper(keys::STATUS), "");
    }

    #[test]
    fn test_percent_decoding() {
        let params = RedirectParams::from_query("message=%EC%B7%A8%EC%86%8C+됨&code=PG_CANCEL");
        assert_eq!(params.get("message"), Some("취소 됨"));
        assert_eq!(params.get("code"), Some("PG_CANCEL"));
    }

    #[test]
    fn test_unparsable_url_is_empty() {
        assert!(RedirectParams::from_url("::not a url::").is_empty());
    }
}
