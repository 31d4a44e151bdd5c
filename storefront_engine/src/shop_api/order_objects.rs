use serde::{Deserialize, Serialize};
use shop_common::Money;

use crate::db_types::{Order, OrderLineItem, ProductId};

/// One requested cart line, as submitted at checkout. Boundary validation (quantity range, non-empty list) happens
/// before this reaches the order flow, but the flow re-checks anyway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// An order together with its line-item snapshots, as returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderLineItem>,
}

/// A customer's paid order history.
#[derive(Debug, Clone, Serialize)]
pub struct OrderHistory {
    pub customer_id: String,
    pub total_paid: Money,
    pub orders: Vec<OrderWithItems>,
}
