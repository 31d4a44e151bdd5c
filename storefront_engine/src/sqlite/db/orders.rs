use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewOrder, Order, OrderId, OrderLineItem, OrderStatusType},
    traits::OrderFlowError,
};

/// Returns the entry in the orders table for the corresponding `order_id`.
pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE order_id = $1").bind(order_id.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

/// Returns the order for `order_id`, but only if it is owned by `customer_id`.
pub async fn fetch_order_for_customer(
    order_id: &OrderId,
    customer_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE order_id = $1 AND customer_id = $2")
        .bind(order_id.as_str())
        .bind(customer_id)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

/// Fetches all orders for a customer, newest first, optionally restricted to a single status.
pub async fn fetch_orders_for_customer(
    customer_id: &str,
    status: Option<OrderStatusType>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let orders = match status {
        Some(status) => {
            sqlx::query_as("SELECT * FROM orders WHERE customer_id = $1 AND status = $2 ORDER BY created_at DESC")
                .bind(customer_id)
                .bind(status)
                .fetch_all(conn)
                .await?
        },
        None => {
            sqlx::query_as("SELECT * FROM orders WHERE customer_id = $1 ORDER BY created_at DESC")
                .bind(customer_id)
                .fetch_all(conn)
                .await?
        },
    };
    Ok(orders)
}

pub async fn fetch_line_items(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderLineItem>, sqlx::Error> {
    let items = sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(items)
}

/// Inserts a new order and its line-item snapshots. This is not atomic on its own; callers wrap it in a transaction
/// and pass `&mut *tx` as the connection argument.
pub async fn insert_order(
    order: NewOrder,
    conn: &mut SqliteConnection,
) -> Result<(Order, Vec<OrderLineItem>), OrderFlowError> {
    if fetch_order_by_order_id(&order.order_id, conn).await?.is_some() {
        return Err(OrderFlowError::OrderAlreadyExists(order.order_id));
    }
    let inserted: Order = sqlx::query_as(
        r#"
        INSERT INTO orders (order_id, customer_id, total_amount, shipping_fee, order_total, status, created_at, expires_at)
        VALUES ($1, $2, $3, $4, $5, 'pending', $6, $7)
        RETURNING *;
        "#,
    )
    .bind(&order.order_id)
    .bind(&order.customer_id)
    .bind(order.total_amount)
    .bind(order.shipping_fee)
    .bind(order.order_total)
    .bind(order.created_at)
    .bind(order.expires_at)
    .fetch_one(&mut *conn)
    .await?;
    let mut items = Vec::with_capacity(order.items.len());
    for line in order.items {
        let item: OrderLineItem = sqlx::query_as(
            r#"
            INSERT INTO order_items (order_id, product_id, name, unit_price, quantity, ship_date, image_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *;
            "#,
        )
        .bind(&inserted.order_id)
        .bind(&line.product_id)
        .bind(&line.name)
        .bind(line.unit_price)
        .bind(line.quantity)
        .bind(line.ship_date)
        .bind(&line.image_url)
        .fetch_one(&mut *conn)
        .await?;
        items.push(item);
    }
    debug!("🗃️ Order [{}] inserted with id {}", inserted.order_id, inserted.id);
    Ok((inserted, items))
}

/// The guarded `pending → paid` transition. The update only applies while the order is still pending, unexpired,
/// and (when a customer filter is given) owned by that customer. Returns `None` when the guard did not match;
/// the caller diagnoses why.
pub async fn try_mark_paid(
    order_id: &OrderId,
    customer_id: Option<&str>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = match customer_id {
        Some(cust) => {
            sqlx::query_as(
                "UPDATE orders SET status = 'paid', paid_at = $1 WHERE order_id = $2 AND customer_id = $3 AND status \
                 = 'pending' AND expires_at >= $1 RETURNING *",
            )
            .bind(now)
            .bind(order_id.as_str())
            .bind(cust)
            .fetch_optional(conn)
            .await?
        },
        None => {
            sqlx::query_as(
                "UPDATE orders SET status = 'paid', paid_at = $1 WHERE order_id = $2 AND status = 'pending' AND \
                 expires_at >= $1 RETURNING *",
            )
            .bind(now)
            .bind(order_id.as_str())
            .fetch_optional(conn)
            .await?
        },
    };
    Ok(order)
}

/// The guarded `pending → cancelled` transition, restricted to the owning customer.
pub async fn try_mark_cancelled(
    order_id: &OrderId,
    customer_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        "UPDATE orders SET status = 'cancelled' WHERE order_id = $1 AND customer_id = $2 AND status = 'pending' \
         RETURNING *",
    )
    .bind(order_id.as_str())
    .bind(customer_id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// The guarded `pending → refunded` transition used by the webhook compensation path. The failed confirmation rolled
/// back, so the order is still pending at this point.
pub async fn try_mark_refunded(
    order_id: &OrderId,
    reason: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        "UPDATE orders SET status = 'refunded', refund_reason = $1, refunded_at = $2 WHERE order_id = $3 AND status \
         = 'pending' RETURNING *",
    )
    .bind(reason)
    .bind(now)
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

pub async fn set_payment_intent(
    order_id: &OrderId,
    intent_id: &str,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE orders SET payment_intent_id = $1 WHERE order_id = $2 AND status = 'pending'")
        .bind(intent_id)
        .bind(order_id.as_str())
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}

/// Bulk-expire every pending order whose deadline passed before the cutoff. Idempotent: orders already swept are no
/// longer pending and do not match again.
pub async fn expire_before(cutoff: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let orders =
        sqlx::query_as("UPDATE orders SET status = 'expired' WHERE status = 'pending' AND expires_at < $1 RETURNING *")
            .bind(cutoff)
            .fetch_all(conn)
            .await?;
    Ok(orders)
}
