use shop_common::Money;
use storefront_engine::{
    db::products::{insert_product, NewProduct},
    db_types::{Product, ProductId},
    SqliteDatabase,
};
use tempfile::TempDir;

/// Creates a fresh, migrated SQLite database in a temporary directory. The `TempDir` must be kept alive for the
/// duration of the test.
pub async fn new_test_db() -> (SqliteDatabase, TempDir) {
    let _ = env_logger::try_init();
    let dir = tempfile::tempdir().expect("Could not create temporary directory");
    let url = format!("sqlite://{}/test_store.db", dir.path().display());
    let db = SqliteDatabase::new_with_url(&url, 8).await.expect("Error creating database");
    (db, dir)
}

pub async fn seed_product(db: &SqliteDatabase, id: &str, price: i64, quota: i64) -> Product {
    seed_product_full(db, id, price, quota, true).await
}

pub async fn seed_product_full(db: &SqliteDatabase, id: &str, price: i64, quota: i64, available: bool) -> Product {
    let mut tx = db.pool().begin().await.expect("Could not begin transaction");
    let product = NewProduct {
        id: ProductId::from(id),
        name: format!("Collectible {id}"),
        price: Money::from(price),
        quota,
        available,
        close_at: None,
        ship_date: None,
        image_url: Some(format!("https://cdn.example.com/{id}.png")),
    };
    let product = insert_product(product, &mut tx).await.expect("Error seeding product");
    tx.commit().await.expect("Could not commit seeded product");
    product
}
