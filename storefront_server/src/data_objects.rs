use std::fmt::Display;

use serde::{Deserialize, Serialize};
use storefront_engine::{
    db_types::{ProductId, MAX_QUANTITY_PER_PRODUCT},
    order_objects::CartLine,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

//--------------------------------------   CreateOrderRequest   -------------------------------------------------------
/// The checkout payload: the cart lines the customer wants to order. Request bodies are loosely shaped on the wire,
/// so the shape and ranges are validated here at the boundary before anything reaches the order flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<CartLineRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLineRequest {
    #[serde(rename = "productId")]
    pub product_id: String,
    pub quantity: i64,
}

impl CreateOrderRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.items.is_empty() {
            return Err("The cart is empty".to_string());
        }
        for item in &self.items {
            if item.product_id.trim().is_empty() {
                return Err("A cart line is missing its product id".to_string());
            }
            if item.quantity < 1 || item.quantity > MAX_QUANTITY_PER_PRODUCT {
                return Err(format!(
                    "Quantity for product {} must be between 1 and {MAX_QUANTITY_PER_PRODUCT}",
                    item.product_id
                ));
            }
        }
        Ok(())
    }

    pub fn into_cart_lines(self) -> Vec<CartLine> {
        self.items
            .into_iter()
            .map(|item| CartLine { product_id: ProductId::from(item.product_id), quantity: item.quantity })
            .collect()
    }
}

//--------------------------------------  PaymentIntentRequest  -------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntentRequest {
    pub amount: i64,
    #[serde(rename = "orderId")]
    pub order_id: String,
}

impl PaymentIntentRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.amount <= 0 {
            return Err("amount must be positive".to_string());
        }
        if self.order_id.trim().is_empty() {
            return Err("orderId must be provided".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntentResult {
    #[serde(rename = "clientSecret")]
    pub client_secret: String,
    #[serde(rename = "paymentIntentId")]
    pub payment_intent_id: String,
}

//--------------------------------------       WebhookAck       -------------------------------------------------------
/// The transport-level acknowledgment returned to the gateway. Webhook responses must always be in the 200 range
/// once the signature has been verified (otherwise the gateway retries forever); the business outcome travels in the
/// optional fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookAck {
    pub received: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refunded: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl WebhookAck {
    pub fn received() -> Self {
        Self { received: true, skipped: None, refunded: None, message: None }
    }

    pub fn skipped() -> Self {
        Self { received: true, skipped: Some(true), refunded: None, message: None }
    }

    pub fn refunded() -> Self {
        Self { received: true, skipped: None, refunded: Some(true), message: None }
    }

    pub fn with_message<S: Display>(mut self, message: S) -> Self {
        self.message = Some(message.to_string());
        self
    }
}
