use log::trace;
use osp_common::Cents;
use sqlx::PgConnection;

use crate::{db_types::Product, traits::PlatformError};

pub async fn fetch_product(id: i32, conn: &mut PgConnection) -> Result<Product, PlatformError> {
    let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(conn)
        .await?;
    product.ok_or(PlatformError::ProductNotFound)
}

/// Reads the product inside the current transaction, taking the row lock. Concurrent placements
/// against the same product serialize here.
pub async fn lock_for_update(id: i32, conn: &mut PgConnection) -> Result<Product, PlatformError> {
    let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(conn)
        .await?;
    product.ok_or(PlatformError::ProductNotFound)
}

/// Conditionally decrements stock: the update only lands if the stored version still matches
/// `expected_version` AND there is enough stock. A zero row count is disambiguated with a follow-up
/// read into [`PlatformError::OutOfStock`] vs [`PlatformError::ConcurrencyConflict`].
pub async fn decrement_stock(
    id: i32,
    quantity: i32,
    expected_version: i32,
    conn: &mut PgConnection,
) -> Result<(), PlatformError> {
    let result = sqlx::query(
        r#"
            UPDATE products
            SET stock = stock - $1, version = version + 1, updated_at = NOW()
            WHERE id = $2 AND version = $3 AND stock >= $1
        "#,
    )
    .bind(quantity)
    .bind(id)
    .bind(expected_version)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        let current_stock: Option<i32> = sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        let current_stock = current_stock.ok_or(PlatformError::ProductNotFound)?;
        if current_stock < quantity {
            return Err(PlatformError::OutOfStock);
        }
        trace!("🗃️ Version mismatch decrementing stock on product #{id}");
        return Err(PlatformError::ConcurrencyConflict(format!(
            "product #{id} was modified by another transaction"
        )));
    }
    Ok(())
}

pub async fn insert_product(
    name: &str,
    stock: i32,
    price: Cents,
    conn: &mut PgConnection,
) -> Result<Product, PlatformError> {
    let product = sqlx::query_as::<_, Product>(
        r#"
            INSERT INTO products (name, stock, price, version)
            VALUES ($1, $2, $3, 1)
            RETURNING *
        "#,
    )
    .bind(name)
    .bind(stock)
    .bind(price)
    .fetch_one(conn)
    .await?;
    Ok(product)
}
