//! The payment gateway bridge.
//!
//! [`PaymentGateway`] is the seam between the order pipeline and the card processor: creating a payment intent the
//! client can complete with its card details, and issuing compensating refunds. [`HttpPaymentGateway`] talks to a
//! Stripe-shaped REST API; tests substitute a mock.
use std::{collections::HashMap, time::Duration};

use log::*;
use serde::{Deserialize, Serialize};
use shop_common::{Money, Secret};
use storefront_engine::db_types::OrderId;
use thiserror::Error;

use crate::config::PaymentGatewayConfig;

/// The event type that triggers order confirmation. Every other event type is acknowledged and ignored.
pub const PAYMENT_SUCCEEDED_EVENT: &str = "payment_intent.succeeded";

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Could not reach the payment gateway. {0}")]
    Http(String),
    #[error("The payment gateway rejected the request ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("The payment gateway returned an unexpected response. {0}")]
    MalformedResponse(String),
    #[error("No payment gateway API key is configured")]
    MissingCredentials,
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        GatewayError::Http(e.to_string())
    }
}

/// A freshly created payment intent. The client secret goes back to the browser, which submits card details
/// directly to the gateway; the intent id stays on the order for later reconciliation and refunds.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefundReceipt {
    pub id: String,
    pub status: String,
}

#[allow(async_fn_in_trait)]
pub trait PaymentGateway {
    /// Create a payment intent for the given amount, tagged with the order id as opaque metadata so the webhook can
    /// later recover which order a gateway event refers to.
    async fn create_intent(&self, amount: Money, order_id: &OrderId) -> Result<PaymentIntent, GatewayError>;

    /// Request a refund of the full captured amount for a payment intent.
    async fn refund_intent(&self, intent_id: &str) -> Result<RefundReceipt, GatewayError>;
}

//--------------------------------------   HttpPaymentGateway   -------------------------------------------------------
#[derive(Clone)]
pub struct HttpPaymentGateway {
    http: reqwest::Client,
    base_url: String,
    api_key: Secret<String>,
}

impl HttpPaymentGateway {
    pub fn new(config: &PaymentGatewayConfig) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| GatewayError::Http(e.to_string()))?;
        Ok(Self { http, base_url: config.api_url.trim_end_matches('/').to_string(), api_key: config.api_key.clone() })
    }

    async fn post_form<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> Result<T, GatewayError> {
        if self.api_key.is_unset() {
            return Err(GatewayError::MissingCredentials);
        }
        let url = format!("{}{path}", self.base_url);
        let response = self.http.post(&url).bearer_auth(self.api_key.reveal()).form(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GatewayErrorBody>(&body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| body.chars().take(200).collect());
            warn!("💳️ Gateway call to {path} failed with status {status}: {message}");
            return Err(GatewayError::Api { status: status.as_u16(), message });
        }
        response.json::<T>().await.map_err(|e| GatewayError::MalformedResponse(e.to_string()))
    }
}

impl PaymentGateway for HttpPaymentGateway {
    async fn create_intent(&self, amount: Money, order_id: &OrderId) -> Result<PaymentIntent, GatewayError> {
        let form = vec![
            ("amount".to_string(), amount.value().to_string()),
            ("currency".to_string(), "usd".to_string()),
            ("metadata[order_id]".to_string(), order_id.as_str().to_string()),
        ];
        let intent: PaymentIntent = self.post_form("/v1/payment_intents", &form).await?;
        debug!("💳️ Created payment intent {} for order {order_id}", intent.id);
        Ok(intent)
    }

    async fn refund_intent(&self, intent_id: &str) -> Result<RefundReceipt, GatewayError> {
        let form = vec![("payment_intent".to_string(), intent_id.to_string())];
        let receipt: RefundReceipt = self.post_form("/v1/refunds", &form).await?;
        info!("💳️ Refund {} ({}) issued for intent {intent_id}", receipt.id, receipt.status);
        Ok(receipt)
    }
}

#[derive(Debug, Deserialize)]
struct GatewayErrorBody {
    error: GatewayErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorDetail {
    #[serde(default)]
    message: String,
}

//--------------------------------------     Webhook events     -------------------------------------------------------
/// A gateway webhook event, as delivered to `/webhooks/payment`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: PaymentEventData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEventData {
    pub object: PaymentIntentObject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntentObject {
    pub id: String,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl PaymentEvent {
    pub fn is_payment_succeeded(&self) -> bool {
        self.event_type == PAYMENT_SUCCEEDED_EVENT
    }

    /// The order this event refers to, recovered from the intent metadata set at intent-creation time.
    pub fn order_id(&self) -> Option<OrderId> {
        self.data.object.metadata.get("order_id").cloned().map(OrderId::from)
    }
}
