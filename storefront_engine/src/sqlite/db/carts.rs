use log::trace;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::db_types::{CartItem, ProductId, MAX_QUANTITY_PER_PRODUCT};

pub async fn items_for_customer(customer_id: &str, conn: &mut SqliteConnection) -> Result<Vec<CartItem>, sqlx::Error> {
    let items = sqlx::query_as("SELECT id, customer_id, product_id, quantity FROM cart_items WHERE customer_id = $1")
        .bind(customer_id)
        .fetch_all(conn)
        .await?;
    Ok(items)
}

/// Add a product to a customer's cart. A duplicate product id is merged into the existing row rather than
/// duplicated, and the quantity is capped at the per-product bound.
pub async fn add_item(
    customer_id: &str,
    product_id: &ProductId,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<CartItem, sqlx::Error> {
    let item = sqlx::query_as(
        r#"
        INSERT INTO cart_items (customer_id, product_id, quantity)
        VALUES ($1, $2, MIN($3, $4))
        ON CONFLICT (customer_id, product_id)
        DO UPDATE SET quantity = MIN($4, cart_items.quantity + $3), updated_at = CURRENT_TIMESTAMP
        RETURNING id, customer_id, product_id, quantity;
        "#,
    )
    .bind(customer_id)
    .bind(product_id.as_str())
    .bind(quantity)
    .bind(MAX_QUANTITY_PER_PRODUCT)
    .fetch_one(conn)
    .await?;
    Ok(item)
}

/// Bulk-remove the given products from a customer's cart. Removing a product that is not in the cart is a no-op,
/// which makes post-payment cleanup safely repeatable.
pub async fn remove_products(
    customer_id: &str,
    product_ids: &[ProductId],
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    if product_ids.is_empty() {
        return Ok(0);
    }
    let mut builder = QueryBuilder::new("DELETE FROM cart_items WHERE customer_id = ");
    builder.push_bind(customer_id);
    builder.push(" AND product_id IN (");
    let mut values = builder.separated(", ");
    for id in product_ids {
        values.push_bind(id.as_str());
    }
    builder.push(")");
    trace!("🗃️ Executing query: {}", builder.sql());
    let result = builder.build().execute(conn).await?;
    Ok(result.rows_affected())
}
