use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;
use shop_common::Money;

use crate::{
    db_types::{NewLineItem, NewOrder, Order, OrderId, OrderLineItem, ProductId, MAX_QUANTITY_PER_PRODUCT},
    events::{EventProducers, OrderAnnulledEvent, OrderPaidEvent},
    helpers::new_order_id,
    shop_api::order_objects::CartLine,
    traits::{CartIssue, OrderFlowError, StorefrontDatabase},
};

/// `OrderFlowApi` is the primary API for the order lifecycle: checkout validation and order creation, payment
/// confirmation, cancellation and expiry.
///
/// Both entry points into payment confirmation — the authenticated API route and the gateway webhook — call
/// [`Self::confirm_order`]; there is deliberately no second copy of the transition logic anywhere.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> OrderFlowApi<B>
where B: StorefrontDatabase
{
    /// Validate a cart snapshot against the catalog and persist a new pending order.
    ///
    /// Every offending line is reported, not just the first one, and nothing is persisted unless the whole cart
    /// validates. No stock is reserved here — quotas are checked now but only enforced by the guarded decrement at
    /// confirmation time.
    pub async fn create_order(
        &self,
        customer_id: &str,
        lines: Vec<CartLine>,
        shipping_fee: Money,
        expiry_window: Duration,
    ) -> Result<(Order, Vec<OrderLineItem>), OrderFlowError> {
        if lines.is_empty() {
            return Err(OrderFlowError::EmptyCart);
        }
        let ids = lines.iter().map(|l| l.product_id.clone()).collect::<Vec<_>>();
        let catalog = self.db.fetch_products(&ids).await?;
        let mut issues = Vec::new();
        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            if line.quantity < 1 || line.quantity > MAX_QUANTITY_PER_PRODUCT {
                issues.push(CartIssue::QuantityOutOfRange {
                    product_id: line.product_id.clone(),
                    quantity: line.quantity,
                });
                continue;
            }
            let product = match catalog.get(&line.product_id) {
                Some(p) => p,
                None => {
                    issues.push(CartIssue::NotFound(line.product_id.clone()));
                    continue;
                },
            };
            if !product.available {
                issues.push(CartIssue::Unavailable(product.id.clone()));
                continue;
            }
            if line.quantity > product.quota {
                issues.push(CartIssue::InsufficientStock {
                    product_id: product.id.clone(),
                    requested: line.quantity,
                    quota: product.quota,
                });
                continue;
            }
            items.push(NewLineItem {
                product_id: product.id.clone(),
                name: product.name.clone(),
                unit_price: product.price,
                quantity: line.quantity,
                ship_date: product.ship_date,
                image_url: product.image_url.clone(),
            });
        }
        if !issues.is_empty() {
            debug!("🔄️📦️ Cart for customer {customer_id} failed validation with {} issue(s)", issues.len());
            return Err(OrderFlowError::InvalidCart(issues));
        }
        let total_amount = items.iter().map(|i| i.unit_price * i.quantity).sum::<Money>();
        let now = Utc::now();
        let new_order = NewOrder {
            order_id: new_order_id(),
            customer_id: customer_id.to_string(),
            items,
            total_amount,
            shipping_fee,
            order_total: total_amount + shipping_fee,
            created_at: now,
            expires_at: now + expiry_window,
        };
        let (order, items) = self.db.insert_order(new_order).await?;
        debug!(
            "🔄️📦️ Order {} created for customer {customer_id}: total {} (+{} shipping), expires {}",
            order.order_id, order.total_amount, order.shipping_fee, order.expires_at
        );
        Ok((order, items))
    }

    /// Confirm payment for a pending order, transitioning it to `paid` and deducting stock atomically.
    ///
    /// `customer_id` is supplied on the authenticated path (ownership enforced) and `None` on the webhook path.
    /// The call is safely repeatable: a second confirmation of an already-paid order fails with
    /// [`OrderFlowError::InvalidState`] and has no effect.
    ///
    /// On success the `OrderPaid` hook fires exactly once and the purchased products are removed from the owning
    /// customer's cart. Cart cleanup is best-effort: a failure there is logged and never unwinds the payment, since
    /// the paid order and the stock decrement are the source of truth.
    pub async fn confirm_order(
        &self,
        order_id: &OrderId,
        customer_id: Option<&str>,
    ) -> Result<(Order, Vec<OrderLineItem>), OrderFlowError> {
        let now = Utc::now();
        let (order, items) = self.db.confirm_order(order_id, customer_id, now).await?;
        info!("🔄️✅️ Order {} confirmed as paid for customer {}", order.order_id, order.customer_id);
        self.call_order_paid_hook(&order, &items).await;
        let product_ids = items.iter().map(|i| i.product_id.clone()).collect::<Vec<ProductId>>();
        match self.db.remove_cart_items(&order.customer_id, &product_ids).await {
            Ok(n) => trace!("🔄️✅️ Removed {n} cart entries for customer {}", order.customer_id),
            Err(e) => warn!(
                "🔄️✅️ Cart cleanup for customer {} after order {} failed: {e}. The payment stands; the stale cart \
                 entries will be corrected on the customer's next sync.",
                order.customer_id, order.order_id
            ),
        }
        Ok((order, items))
    }

    /// Cancel a customer's own pending order.
    pub async fn cancel_order(&self, order_id: &OrderId, customer_id: &str) -> Result<Order, OrderFlowError> {
        let order = self.db.cancel_order(order_id, customer_id).await?;
        info!("🔄️❌️ Order {} cancelled by customer {customer_id}", order.order_id);
        self.call_order_annulled_hook(&order).await;
        Ok(order)
    }

    /// Record the compensating refund for an order whose gateway payment could not be reconciled.
    pub async fn mark_order_refunded(&self, order_id: &OrderId, reason: &str) -> Result<Order, OrderFlowError> {
        let order = self.db.mark_order_refunded(order_id, reason, Utc::now()).await?;
        info!("🔄️↩️ Order {} marked as refunded: {reason}", order.order_id);
        Ok(order)
    }

    /// Attach the gateway payment-intent id to a pending order.
    pub async fn attach_payment_intent(&self, order_id: &OrderId, intent_id: &str) -> Result<(), OrderFlowError> {
        self.db.set_payment_intent(order_id, intent_id).await
    }

    /// Mark every overdue pending order as expired. Pure and idempotent; no stock was reserved for pending orders,
    /// so there is nothing to compensate.
    pub async fn expire_old_orders(&self) -> Result<Vec<Order>, OrderFlowError> {
        let expired = self.db.expire_orders_before(Utc::now()).await?;
        for order in &expired {
            self.call_order_annulled_hook(order).await;
        }
        Ok(expired)
    }

    async fn call_order_paid_hook(&self, order: &Order, items: &[OrderLineItem]) {
        for emitter in &self.producers.order_paid_producer {
            trace!("🔄️📦️ Notifying order-paid hook subscribers");
            let event = OrderPaidEvent { order: order.clone(), items: items.to_vec() };
            emitter.publish_event(event).await;
        }
    }

    async fn call_order_annulled_hook(&self, order: &Order) {
        for emitter in &self.producers.order_annulled_producer {
            trace!("🔄️📦️ Notifying order-annulled hook subscribers");
            let event = OrderAnnulledEvent { order: order.clone(), status: order.status };
            emitter.publish_event(event).await;
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
