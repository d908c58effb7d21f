//! # HTTP Backend Client
//!
//! reqwest implementation of [`BackendApi`] against the payment/subscription
//! REST backend.
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | GET | `/billing-keys` | list cards |
//! | POST | `/billing-keys/register` | register billing key |
//! | POST | `/billing-keys/confirm` | confirm issuance token |
//! | DELETE | `/billing-keys/by-id/{payId}` | delete by id |
//! | DELETE | `/billing-keys/{billingKey}` | delete by key |
//! | POST | `/subscriptions/start` | create invoice |
//! | POST | `/subscriptions/cancel-renewal` | cancel next renewal |
//! | POST | `/payments/confirm` | start / confirm payment |
//! | GET | `/payments/{handle}` | payment status |
//! | POST | `/payments/{paymentId}/cancel` | cancel payment |

use crate::config::BackendConfig;
use crate::fields;
use async_trait::async_trait;
use checkout_core::{
    BackendApi, CardOption, CheckoutError, CheckoutResult, ConfirmPayment, ConfirmedBillingKey,
    PaymentConfirmation, PaymentSnapshot, PaymentSource, RegisterBillingKey, StartSubscription,
    SubscriptionInvoice,
};
use reqwest::{Client, Method};
use serde_json::{json, Value};
use tracing::{debug, error, instrument};
use url::Url;
use uuid::Uuid;

/// Backend client over HTTP/JSON
#[derive(Debug, Clone)]
pub struct HttpBackend {
    config: BackendConfig,
    base_url: Url,
    client: Client,
}

impl HttpBackend {
    /// Create a new backend client
    pub fn new(config: BackendConfig) -> CheckoutResult<Self> {
        config.validate()?;
        let base_url = Url::parse(&config.api_base_url)
            .map_err(|e| CheckoutError::Configuration(e.to_string()))?;

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                CheckoutError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            config,
            base_url,
            client,
        })
    }

    /// Create from environment variables
    pub fn from_env() -> CheckoutResult<Self> {
        Self::new(BackendConfig::from_env()?)
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Base URL joined with percent-encoded path segments
    fn endpoint(&self, segments: &[&str]) -> CheckoutResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                CheckoutError::Configuration("API base URL cannot carry a path".to_string())
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a request and return the parsed JSON body (`Null` when empty).
    async fn send(&self, method: Method, url: Url, body: Option<Value>) -> CheckoutResult<Value> {
        let request_id = Uuid::new_v4().to_string();
        debug!(%method, %url, %request_id, "backend request");

        let mut request = self
            .client
            .request(method.clone(), url.clone())
            .header("Accept", "application/json")
            .header("X-Request-Id", &request_id);

        if let Some(auth) = self.config.auth_header() {
            request = request.header("Authorization", auth);
        }
        if let Some(ref body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CheckoutError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| CheckoutError::Network(e.to_string()))?;

        if !status.is_success() {
            error!(%method, %url, status = status.as_u16(), body = %text, "backend error");
            return Err(CheckoutError::Backend {
                status: status.as_u16(),
                message: fields::error_message(&text, status.as_u16()),
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|e| {
            CheckoutError::Serialization(format!("Failed to parse backend response: {}", e))
        })
    }

    async fn get(&self, segments: &[&str]) -> CheckoutResult<Value> {
        let url = self.endpoint(segments)?;
        self.send(Method::GET, url, None).await
    }

    async fn post(&self, segments: &[&str], body: Value) -> CheckoutResult<Value> {
        let url = self.endpoint(segments)?;
        self.send(Method::POST, url, Some(body)).await
    }

    async fn delete(&self, segments: &[&str]) -> CheckoutResult<Value> {
        let url = self.endpoint(segments)?;
        self.send(Method::DELETE, url, None).await
    }
}

/// Numeric-looking ids go out as JSON numbers, everything else as strings
fn id_value(id: &str) -> Value {
    match id.parse::<i64>() {
        Ok(n) => json!(n),
        Err(_) => json!(id),
    }
}

fn start_subscription_body(request: &StartSubscription) -> Value {
    let mut body = json!({
        "planCode": request.plan.plan_code,
        "months": request.plan.months,
    });
    match request.source {
        PaymentSource::PayId(ref pay_id) => body["payId"] = id_value(pay_id),
        PaymentSource::BillingKey(ref key) => body["billingKey"] = json!(key),
    }
    body
}

fn confirm_payment_body(request: &ConfirmPayment) -> Value {
    match request {
        ConfirmPayment::ByInvoice(invoice_id) => json!({ "invoiceId": invoice_id.value() }),
        ConfirmPayment::ByPayment { payment_id, amount } => {
            json!({ "paymentId": payment_id, "amount": amount })
        }
    }
}

#[async_trait]
impl BackendApi for HttpBackend {
    #[instrument(skip(self))]
    async fn list_billing_keys(&self) -> CheckoutResult<Vec<CardOption>> {
        let body = self.get(&["billing-keys"]).await?;
        let cards = fields::card_options(&body);
        debug!("Loaded {} billing keys", cards.len());
        Ok(cards)
    }

    #[instrument(skip(self, request))]
    async fn register_billing_key(&self, request: &RegisterBillingKey) -> CheckoutResult<()> {
        let body = serde_json::to_value(request)
            .map_err(|e| CheckoutError::Serialization(e.to_string()))?;
        self.post(&["billing-keys", "register"], body).await?;
        Ok(())
    }

    #[instrument(skip(self, billing_issue_token))]
    async fn confirm_billing_key(
        &self,
        billing_issue_token: &str,
    ) -> CheckoutResult<ConfirmedBillingKey> {
        let body = self
            .post(
                &["billing-keys", "confirm"],
                json!({ "billingIssueToken": billing_issue_token }),
            )
            .await?;
        Ok(fields::confirmed_billing_key(body))
    }

    #[instrument(skip(self))]
    async fn delete_billing_key_by_id(&self, pay_id: &str) -> CheckoutResult<()> {
        self.delete(&["billing-keys", "by-id", pay_id]).await?;
        Ok(())
    }

    #[instrument(skip(self, billing_key))]
    async fn delete_billing_key(&self, billing_key: &str) -> CheckoutResult<()> {
        self.delete(&["billing-keys", billing_key]).await?;
        Ok(())
    }

    #[instrument(skip(self, request), fields(plan = %request.plan.plan_code, months = request.plan.months))]
    async fn start_subscription(
        &self,
        request: &StartSubscription,
    ) -> CheckoutResult<SubscriptionInvoice> {
        let body = self
            .post(&["subscriptions", "start"], start_subscription_body(request))
            .await?;
        Ok(fields::invoice(body))
    }

    #[instrument(skip(self))]
    async fn confirm_payment(
        &self,
        request: &ConfirmPayment,
    ) -> CheckoutResult<PaymentConfirmation> {
        let body = self
            .post(&["payments", "confirm"], confirm_payment_body(request))
            .await?;
        Ok(fields::confirmation(&body))
    }

    #[instrument(skip(self))]
    async fn payment_status(&self, handle: &str) -> CheckoutResult<PaymentSnapshot> {
        if handle.is_empty() {
            return Err(CheckoutError::InvalidRequest(
                "payment handle is required".to_string(),
            ));
        }
        let body = self.get(&["payments", handle]).await?;
        Ok(fields::snapshot(&body))
    }

    #[instrument(skip(self))]
    async fn cancel_payment(&self, payment_id: &str, reason: &str) -> CheckoutResult<()> {
        if payment_id.is_empty() {
            return Err(CheckoutError::InvalidRequest(
                "paymentId is required".to_string(),
            ));
        }
        self.post(&["payments", payment_id, "cancel"], json!({ "reason": reason }))
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn cancel_renewal(&self, reason: &str) -> CheckoutResult<()> {
        self.post(
            &["subscriptions", "cancel-renewal"],
            json!({ "reason": reason }),
        )
        .await?;
        Ok(())
    }
}
