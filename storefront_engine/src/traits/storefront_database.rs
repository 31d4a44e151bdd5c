use std::fmt::Display;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{NewOrder, Order, OrderId, OrderLineItem, OrderStatusType, ProductId},
    traits::OrderManagement,
};

/// The mutation surface of a storefront backend.
///
/// Every method that touches more than one row executes as a single atomic transaction; callers never observe
/// partial effects on failure. The central contract is [`Self::confirm_order`]: it is the only place where product
/// stock is deducted, and it must be safe under arbitrary concurrent invocations — both repeated confirms of the
/// same order (exactly one wins) and confirms of different orders contending for the same product (no oversell).
#[allow(async_fn_in_trait)]
pub trait StorefrontDatabase: Clone + OrderManagement {
    /// The URL of the database.
    fn url(&self) -> &str;

    /// Persist a new pending order together with its line-item snapshots, atomically. Fails with
    /// [`OrderFlowError::OrderAlreadyExists`] if the order id is already taken.
    async fn insert_order(&self, order: NewOrder) -> Result<(Order, Vec<OrderLineItem>), OrderFlowError>;

    /// Transition an order from `pending` to `paid`, deducting stock along the way.
    ///
    /// When `customer_id` is given (the authenticated API path), the order must belong to that customer; the webhook
    /// path passes `None` and no ownership filter applies.
    ///
    /// The whole operation runs inside one transaction:
    /// 1. locate the order ([`OrderFlowError::OrderNotFound`] if absent),
    /// 2. require `pending` status ([`OrderFlowError::InvalidState`] otherwise — this is what makes repeated
    ///    confirms safe),
    /// 3. require `expires_at >= now` ([`OrderFlowError::OrderExpired`] otherwise),
    /// 4. for each line item, decrement the product quota conditioned on sufficient stock at write time; a zero-row
    ///    update aborts the transaction with [`OrderFlowError::InsufficientStock`],
    /// 5. increment each product's cumulative purchase counter,
    /// 6. set status = `paid` and `paid_at = now`, guarded on the status still being `pending`.
    ///
    /// Cart cleanup is *not* part of the transaction; it is a follow-up action owned by the caller.
    async fn confirm_order(
        &self,
        order_id: &OrderId,
        customer_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(Order, Vec<OrderLineItem>), OrderFlowError>;

    /// Transition a customer's own pending order to `cancelled`.
    async fn cancel_order(&self, order_id: &OrderId, customer_id: &str) -> Result<Order, OrderFlowError>;

    /// Record the compensating refund for an order whose gateway payment could not be reconciled: status becomes
    /// `refunded`, with the failure reason and refund timestamp. The order must still be `pending` (the failed
    /// confirmation rolled back).
    async fn mark_order_refunded(
        &self,
        order_id: &OrderId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Order, OrderFlowError>;

    /// Bulk-transition every pending order whose deadline has passed to `expired`. Idempotent and monotonic:
    /// a second sweep with no new expirations is a no-op. Returns the orders that were expired by this call.
    async fn expire_orders_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, OrderFlowError>;

    /// Attach the payment-intent identifier obtained from the gateway to a pending order.
    async fn set_payment_intent(&self, order_id: &OrderId, intent_id: &str) -> Result<(), OrderFlowError>;

    /// Remove the given products from a customer's cart. Idempotent bulk removal used after successful payment;
    /// returns the number of rows removed.
    async fn remove_cart_items(&self, customer_id: &str, product_ids: &[ProductId]) -> Result<u64, OrderFlowError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), OrderFlowError> {
        Ok(())
    }
}

//--------------------------------------     OrderFlowError    -------------------------------------------------------
#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("The cart is empty; nothing to order")]
    EmptyCart,
    #[error("The cart could not be validated: {}", format_issues(.0))]
    InvalidCart(Vec<CartIssue>),
    #[error("Cannot insert order {0}, it already exists")]
    OrderAlreadyExists(OrderId),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Order {order} is {status} and cannot be transitioned")]
    InvalidState { order: OrderId, status: OrderStatusType },
    #[error("Order {0} has passed its payment deadline")]
    OrderExpired(OrderId),
    #[error("Insufficient stock for product {0}")]
    InsufficientStock(ProductId),
}

impl From<sqlx::Error> for OrderFlowError {
    fn from(e: sqlx::Error) -> Self {
        OrderFlowError::DatabaseError(e.to_string())
    }
}

/// A single offending cart line. Creation-time validation reports every bad line, not just the first one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartIssue {
    NotFound(ProductId),
    Unavailable(ProductId),
    InsufficientStock { product_id: ProductId, requested: i64, quota: i64 },
    QuantityOutOfRange { product_id: ProductId, quantity: i64 },
}

impl Display for CartIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CartIssue::NotFound(id) => write!(f, "product {id} does not exist"),
            CartIssue::Unavailable(id) => write!(f, "product {id} is not available for purchase"),
            CartIssue::InsufficientStock { product_id, requested, quota } => {
                write!(f, "product {product_id} has {quota} left, {requested} requested")
            },
            CartIssue::QuantityOutOfRange { product_id, quantity } => {
                write!(f, "quantity {quantity} for product {product_id} is out of range")
            },
        }
    }
}

fn format_issues(issues: &[CartIssue]) -> String {
    issues.iter().map(|i| i.to_string()).collect::<Vec<_>>().join("; ")
}
