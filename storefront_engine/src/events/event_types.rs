use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderLineItem, OrderStatusType};

/// Fired exactly once when an order transitions to `paid`, whichever entry point (API route or webhook) performed
/// the confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPaidEvent {
    pub order: Order,
    pub items: Vec<OrderLineItem>,
}

impl OrderPaidEvent {
    pub fn new(order: Order, items: Vec<OrderLineItem>) -> Self {
        Self { order, items }
    }
}

/// Fired when an order leaves the pending state without being paid: cancellation or expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAnnulledEvent {
    pub order: Order,
    pub status: OrderStatusType,
}

impl OrderAnnulledEvent {
    pub fn new(order: Order) -> Self {
        let status = order.status;
        Self { order, status }
    }
}
