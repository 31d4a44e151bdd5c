use chrono::{DateTime, Utc};
use log::trace;
use shop_common::Money;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{Product, ProductId},
    traits::OrderFlowError,
};

/// Fetch a single product by id.
pub async fn fetch_product(id: &ProductId, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    let product =
        sqlx::query_as("SELECT * FROM products WHERE id = $1").bind(id.as_str()).fetch_optional(conn).await?;
    Ok(product)
}

/// Batch-fetch products by id. Ids that do not exist are simply missing from the result.
pub async fn fetch_products(ids: &[ProductId], conn: &mut SqliteConnection) -> Result<Vec<Product>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut builder = QueryBuilder::new("SELECT * FROM products WHERE id IN (");
    let mut values = builder.separated(", ");
    for id in ids {
        values.push_bind(id.as_str());
    }
    builder.push(")");
    trace!("🗃️ Executing query: {}", builder.sql());
    let products = builder.build_query_as::<Product>().fetch_all(conn).await?;
    Ok(products)
}

/// The guarded conditional decrement — the sole enforcement point for the stock invariant.
///
/// The quota is only reduced if it is still sufficient *at the moment of the update*; the purchase counter is bumped
/// in the same statement. Returns the number of rows affected: zero means the stock ran out and the caller must
/// abort its transaction.
pub async fn reserve_stock(
    product_id: &ProductId,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE products
        SET quota = quota - $1,
            brought_count = brought_count + $1,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = $2 AND quota >= $1
        "#,
    )
    .bind(quantity)
    .bind(product_id.as_str())
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// Parameters for inserting a catalog entry. Catalog administration is handled elsewhere; this exists for seeding
/// and tests.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub quota: i64,
    pub available: bool,
    pub close_at: Option<DateTime<Utc>>,
    pub ship_date: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
}

pub async fn insert_product(product: NewProduct, conn: &mut SqliteConnection) -> Result<Product, OrderFlowError> {
    let product = sqlx::query_as(
        r#"
        INSERT INTO products (id, name, price, quota, available, close_at, ship_date, image_url, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
        RETURNING *;
        "#,
    )
    .bind(product.id)
    .bind(product.name)
    .bind(product.price)
    .bind(product.quota)
    .bind(product.available)
    .bind(product.close_at)
    .bind(product.ship_date)
    .bind(product.image_url)
    .fetch_one(conn)
    .await?;
    Ok(product)
}
