use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shop_common::Money;
use sqlx::{FromRow, Type};
use thiserror::Error;

//--------------------------------------      ProductId      ---------------------------------------------------------
/// A lightweight wrapper around the catalog identifier of a product.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct ProductId(pub String);

impl<S: Into<String>> From<S> for ProductId {
    fn from(value: S) -> Self {
        Self(value.into())
    }
}

impl Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ProductId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------       OrderId       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------   OrderStatusType   ---------------------------------------------------------
/// The order lifecycle. `Pending` is the only non-terminal state; every other status is terminal and no further
/// transitions are permitted from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatusType {
    /// Awaiting payment confirmation within the expiry window.
    Pending,
    /// Payment confirmed and stock deducted.
    Paid,
    /// The expiry sweeper marked the order as overdue.
    Expired,
    /// The customer cancelled the order before paying.
    Cancelled,
    /// A gateway-confirmed payment could not be reconciled and was refunded.
    Refunded,
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatusType::Pending => "pending",
            OrderStatusType::Paid => "paid",
            OrderStatusType::Expired => "expired",
            OrderStatusType::Cancelled => "cancelled",
            OrderStatusType::Refunded => "refunded",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid order status: {0}")]
pub struct StatusConversionError(String);

impl FromStr for OrderStatusType {
    type Err = StatusConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "expired" => Ok(Self::Expired),
            "cancelled" => Ok(Self::Cancelled),
            "refunded" => Ok(Self::Refunded),
            s => Err(StatusConversionError(s.to_string())),
        }
    }
}

impl OrderStatusType {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatusType::Pending)
    }
}

//--------------------------------------       Product       ---------------------------------------------------------
/// A catalog entry. The core only ever reads products, with one exception: the guarded quota decrement performed
/// inside the confirmation transaction.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    /// Remaining purchasable stock. Never negative; only mutated through the guarded conditional decrement.
    pub quota: i64,
    pub available: bool,
    pub close_at: Option<DateTime<Utc>>,
    pub ship_date: Option<DateTime<Utc>>,
    /// Cumulative count of units sold across all paid orders.
    pub brought_count: i64,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------        Order        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub customer_id: String,
    pub total_amount: Money,
    pub shipping_fee: Money,
    pub order_total: Money,
    pub status: OrderStatusType,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_intent_id: Option<String>,
    pub refund_reason: Option<String>,
    pub refunded_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

//--------------------------------------     OrderLineItem   ---------------------------------------------------------
/// A line of an order. This is a snapshot of the product at order-creation time; later catalog edits must never
/// alter historical orders.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct OrderLineItem {
    pub id: i64,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Money,
    pub quantity: i64,
    pub ship_date: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
}

//--------------------------------------       NewOrder      ---------------------------------------------------------
/// The payload assembled by the order-flow API once a cart snapshot has been validated against the catalog.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub customer_id: String,
    pub items: Vec<NewLineItem>,
    pub total_amount: Money,
    pub shipping_fee: Money,
    pub order_total: Money,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewLineItem {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Money,
    pub quantity: i64,
    pub ship_date: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
}

//--------------------------------------      CartItem       ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CartItem {
    pub id: i64,
    pub customer_id: String,
    pub product_id: ProductId,
    pub quantity: i64,
}

/// The upper bound on the quantity of a single product in one cart.
pub const MAX_QUANTITY_PER_PRODUCT: i64 = 3;
