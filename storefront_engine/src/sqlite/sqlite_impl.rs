//! `SqliteDatabase` is a concrete implementation of a storefront storage backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements the traits defined in the [`crate::traits`] module.
use std::{collections::HashMap, fmt::Debug};

use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqlitePool;

use super::db::{carts, new_pool, orders, products};
use crate::{
    db_types::{CartItem, NewOrder, Order, OrderId, OrderLineItem, OrderStatusType, Product, ProductId},
    traits::{OrderFlowError, OrderManagement, StorefrontDatabase},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new connection pool (and the database itself, if missing) and runs the embedded migrations.
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, OrderFlowError> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl OrderManagement for SqliteDatabase {
    async fn fetch_product(&self, id: &ProductId) -> Result<Option<Product>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::fetch_product(id, &mut conn).await?;
        Ok(product)
    }

    async fn fetch_products(&self, ids: &[ProductId]) -> Result<HashMap<ProductId, Product>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let products = products::fetch_products(ids, &mut conn).await?;
        Ok(products.into_iter().map(|p| (p.id.clone(), p)).collect())
    }

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_for_customer(
        &self,
        order_id: &OrderId,
        customer_id: &str,
    ) -> Result<Option<Order>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_for_customer(order_id, customer_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_orders_for_customer(
        &self,
        customer_id: &str,
        status: Option<OrderStatusType>,
    ) -> Result<Vec<Order>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let result = orders::fetch_orders_for_customer(customer_id, status, &mut conn).await?;
        Ok(result)
    }

    async fn fetch_line_items(&self, order_id: &OrderId) -> Result<Vec<OrderLineItem>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let items = orders::fetch_line_items(order_id, &mut conn).await?;
        Ok(items)
    }

    async fn fetch_cart_items(&self, customer_id: &str) -> Result<Vec<CartItem>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let items = carts::items_for_customer(customer_id, &mut conn).await?;
        Ok(items)
    }
}

impl StorefrontDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order(&self, order: NewOrder) -> Result<(Order, Vec<OrderLineItem>), OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let (order, items) = orders::insert_order(order, &mut tx).await?;
        tx.commit().await?;
        Ok((order, items))
    }

    async fn confirm_order(
        &self,
        order_id: &OrderId,
        customer_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(Order, Vec<OrderLineItem>), OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        // The guarded transition runs first so that the transaction takes the write lock up front; concurrent
        // confirms serialise here, and the loser sees a non-pending status.
        let order = match orders::try_mark_paid(order_id, customer_id, now, &mut tx).await? {
            Some(order) => order,
            None => {
                let existing = match customer_id {
                    Some(cust) => orders::fetch_order_for_customer(order_id, cust, &mut tx).await?,
                    None => orders::fetch_order_by_order_id(order_id, &mut tx).await?,
                };
                return match existing {
                    None => Err(OrderFlowError::OrderNotFound(order_id.clone())),
                    Some(o) if o.status != OrderStatusType::Pending => {
                        Err(OrderFlowError::InvalidState { order: o.order_id, status: o.status })
                    },
                    Some(o) => Err(OrderFlowError::OrderExpired(o.order_id)),
                };
            },
        };
        let items = orders::fetch_line_items(order_id, &mut tx).await?;
        for item in &items {
            let updated = products::reserve_stock(&item.product_id, item.quantity, &mut tx).await?;
            if updated == 0 {
                // Dropping the transaction rolls back the status flip and any earlier decrements.
                info!(
                    "🗃️ Confirmation of order {} aborted: stock ran out for product {}",
                    order.order_id, item.product_id
                );
                return Err(OrderFlowError::InsufficientStock(item.product_id.clone()));
            }
        }
        tx.commit().await?;
        debug!("🗃️ Order {} marked as paid; {} line items fulfilled", order.order_id, items.len());
        Ok((order, items))
    }

    async fn cancel_order(&self, order_id: &OrderId, customer_id: &str) -> Result<Order, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        match orders::try_mark_cancelled(order_id, customer_id, &mut conn).await? {
            Some(order) => Ok(order),
            None => match orders::fetch_order_for_customer(order_id, customer_id, &mut conn).await? {
                None => Err(OrderFlowError::OrderNotFound(order_id.clone())),
                Some(o) => Err(OrderFlowError::InvalidState { order: o.order_id, status: o.status }),
            },
        }
    }

    async fn mark_order_refunded(
        &self,
        order_id: &OrderId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Order, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        match orders::try_mark_refunded(order_id, reason, now, &mut conn).await? {
            Some(order) => Ok(order),
            None => match orders::fetch_order_by_order_id(order_id, &mut conn).await? {
                None => Err(OrderFlowError::OrderNotFound(order_id.clone())),
                Some(o) => Err(OrderFlowError::InvalidState { order: o.order_id, status: o.status }),
            },
        }
    }

    async fn expire_orders_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let expired = orders::expire_before(cutoff, &mut conn).await?;
        Ok(expired)
    }

    async fn set_payment_intent(&self, order_id: &OrderId, intent_id: &str) -> Result<(), OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let updated = orders::set_payment_intent(order_id, intent_id, &mut conn).await?;
        if updated == 0 {
            return Err(OrderFlowError::OrderNotFound(order_id.clone()));
        }
        Ok(())
    }

    async fn remove_cart_items(&self, customer_id: &str, product_ids: &[ProductId]) -> Result<u64, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let removed = carts::remove_products(customer_id, product_ids, &mut conn).await?;
        Ok(removed)
    }

    async fn close(&mut self) -> Result<(), OrderFlowError> {
        self.pool.close().await;
        Ok(())
    }
}
