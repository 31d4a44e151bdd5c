use std::collections::HashMap;

use crate::{
    db_types::{CartItem, Order, OrderId, OrderLineItem, OrderStatusType, Product, ProductId},
    traits::OrderFlowError,
};

/// Read-only storage operations: catalog lookups, order queries and cart contents.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    /// Fetch a single product by id.
    async fn fetch_product(&self, id: &ProductId) -> Result<Option<Product>, OrderFlowError>;

    /// Batch-fetch products. Ids that do not exist are simply absent from the result map.
    async fn fetch_products(&self, ids: &[ProductId]) -> Result<HashMap<ProductId, Product>, OrderFlowError>;

    /// Fetch an order by its public order id, regardless of owner. Used on the webhook path, where the caller is
    /// trusted and no ownership filter applies.
    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, OrderFlowError>;

    /// Fetch an order by its public order id, but only if it belongs to the given customer.
    async fn fetch_order_for_customer(
        &self,
        order_id: &OrderId,
        customer_id: &str,
    ) -> Result<Option<Order>, OrderFlowError>;

    /// Fetch all orders for a customer, optionally filtered by status. Results are ordered by creation time,
    /// newest first.
    async fn fetch_orders_for_customer(
        &self,
        customer_id: &str,
        status: Option<OrderStatusType>,
    ) -> Result<Vec<Order>, OrderFlowError>;

    /// Fetch the line-item snapshots for an order.
    async fn fetch_line_items(&self, order_id: &OrderId) -> Result<Vec<OrderLineItem>, OrderFlowError>;

    /// Fetch the current cart contents for a customer.
    async fn fetch_cart_items(&self, customer_id: &str) -> Result<Vec<CartItem>, OrderFlowError>;
}
