use shop_common::Money;

use crate::{
    db_types::{OrderId, OrderStatusType},
    shop_api::order_objects::{OrderHistory, OrderWithItems},
    traits::{OrderFlowError, OrderManagement},
};

/// Read-only order queries used by the HTTP layer.
#[derive(Debug, Clone)]
pub struct OrderQueryApi<B> {
    db: B,
}

impl<B> OrderQueryApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> OrderQueryApi<B>
where B: OrderManagement
{
    /// A customer's paid order history, newest first, with line-item snapshots.
    pub async fn paid_order_history(&self, customer_id: &str) -> Result<OrderHistory, OrderFlowError> {
        let orders = self.db.fetch_orders_for_customer(customer_id, Some(OrderStatusType::Paid)).await?;
        let total_paid = orders.iter().map(|o| o.order_total).sum::<Money>();
        let mut result = Vec::with_capacity(orders.len());
        for order in orders {
            let items = self.db.fetch_line_items(&order.order_id).await?;
            result.push(OrderWithItems { order, items });
        }
        Ok(OrderHistory { customer_id: customer_id.to_string(), total_paid, orders: result })
    }

    /// Fetch a single order with its items. When `customer_id` is given, ownership is enforced and other customers'
    /// orders are reported as absent, whether they exist or not.
    pub async fn fetch_order(
        &self,
        order_id: &OrderId,
        customer_id: Option<&str>,
    ) -> Result<Option<OrderWithItems>, OrderFlowError> {
        let order = match customer_id {
            Some(cust) => self.db.fetch_order_for_customer(order_id, cust).await?,
            None => self.db.fetch_order_by_order_id(order_id).await?,
        };
        match order {
            Some(order) => {
                let items = self.db.fetch_line_items(&order.order_id).await?;
                Ok(Some(OrderWithItems { order, items }))
            },
            None => Ok(None),
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
