use log::debug;
use osp_common::Cents;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    db_types::{NewOrder, Order, OrderStatus},
    pg::products,
    traits::PlatformError,
};

/// Inserts a confirmed order. Not atomic on its own; embed the call in a transaction and pass
/// `&mut tx` as the connection argument to get atomicity with the stock decrement.
pub async fn insert_order(
    id: Uuid,
    order: &NewOrder,
    total: Cents,
    conn: &mut PgConnection,
) -> Result<Order, PlatformError> {
    let order = sqlx::query_as::<_, Order>(
        r#"
            INSERT INTO orders (id, product_id, buyer_id, quantity, status, total_cents)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
        "#,
    )
    .bind(id)
    .bind(order.product_id)
    .bind(&order.buyer_id)
    .bind(order.quantity)
    .bind(OrderStatus::Confirmed.to_string())
    .bind(total)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Order [{}] inserted for product #{}", order.id, order.product_id);
    Ok(order)
}

pub async fn fetch_order(id: Uuid, conn: &mut PgConnection) -> Result<Order, PlatformError> {
    let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
        .bind(id)
        .fetch_optional(conn)
        .await?;
    order.ok_or(PlatformError::OrderNotFound)
}

/// Fetches an order and attaches its product snapshot. A missing order and a missing product are
/// reported as distinct errors.
pub async fn fetch_order_with_product(id: Uuid, conn: &mut PgConnection) -> Result<Order, PlatformError> {
    let mut order = fetch_order(id, &mut *conn).await?;
    let product = products::fetch_product(order.product_id, conn).await?;
    order.product = Some(product);
    Ok(order)
}

/// Most-recent-first page of orders, without product snapshots.
pub async fn list_orders(limit: i64, offset: i64, conn: &mut PgConnection) -> Result<Vec<Order>, PlatformError> {
    let orders = sqlx::query_as::<_, Order>(
        "SELECT * FROM orders ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(conn)
    .await?;
    Ok(orders)
}
