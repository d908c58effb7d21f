//! # Navigation
//!
//! Page location access and the client-side routes the flows send the
//! shopper to.

use url::form_urlencoded;

/// Landing route the gateway redirects back to after billing-key issuance
pub const BILLING_KEY_REDIRECT_PATH: &str = "/#/billing-keys/redirect";

/// Result view reached when polling observes a terminal state
pub const RESULT_PATH: &str = "/plan/checkout/result";

/// Subscription status view shown after a confirmed payment
pub const SUBSCRIPTION_STATUS_PATH: &str = "/sub/me";

/// Browser location: read the current URL, navigate away.
///
/// `navigate` is fire-and-forget; in a browser control does not come back
/// to the caller's page.
pub trait Navigator {
    fn current_href(&self) -> String;
    fn navigate(&self, url: &str);
}

/// Result-view route carrying the terminal poll outcome
pub fn result_route(invoice_id: Option<&str>, payment_id: &str, status: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("invoiceId", invoice_id.unwrap_or_default())
        .append_pair("paymentId", payment_id)
        .append_pair("status", status)
        .finish();
    format!("{}?{}", RESULT_PATH, query)
}

/// Redirect-landing URL under `origin`, e.g. `https://shop.example.com/#/billing-keys/redirect`
pub fn billing_key_redirect_url(origin: &str) -> String {
    format!("{}{}", origin.trim_end_matches('/'), BILLING_KEY_REDIRECT_PATH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_route() {
        assert_eq!(
            result_route(Some("1001"), "p1", "PAID"),
            "/plan/checkout/result?invoiceId=1001&paymentId=p1&status=PAID"
        );
        assert_eq!(
            result_route(None, "p 2", "FAILED"),
            "/plan/checkout/result?invoiceId=&paymentId=p+2&status=FAILED"
        );
    }

    #[test]
    fn test_billing_key_redirect_url() {
        assert_eq!(
            billing_key_redirect_url("https://shop.example.com/"),
            "https://shop.example.com/#/billing-keys/redirect"
        );
    }
}
