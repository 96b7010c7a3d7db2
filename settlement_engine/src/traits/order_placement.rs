use async_trait::async_trait;
use osp_common::Cents;
use uuid::Uuid;

use crate::{
    db_types::{NewOrder, Order, Product},
    traits::PlatformError,
};

/// Product stock access and the atomic order placement flow.
#[async_trait]
pub trait OrderPlacement: Send + Sync {
    /// Places an order in a single storage transaction:
    ///
    /// 1. Lock the product row for update.
    /// 2. Reject with [`PlatformError::OutOfStock`] if stock is short.
    /// 3. Capture `total = price × quantity` at placement time.
    /// 4. Insert the order in CONFIRMED state.
    /// 5. Conditionally decrement stock against the version read under the lock; a failed condition
    ///    aborts the whole transaction with `OutOfStock` or `ConcurrencyConflict`.
    ///
    /// The caller is responsible for input validation; this method assumes a well-formed request.
    async fn place_order(&self, order: NewOrder) -> Result<Order, PlatformError>;

    /// Fetches an order together with a snapshot of its product.
    ///
    /// Fails with [`PlatformError::OrderNotFound`] if the order is missing and
    /// [`PlatformError::ProductNotFound`] if the order exists but its product does not.
    async fn fetch_order_with_product(&self, id: Uuid) -> Result<Order, PlatformError>;

    /// Most-recent-first page of orders.
    async fn fetch_orders(&self, limit: i64, offset: i64) -> Result<Vec<Order>, PlatformError>;

    async fn fetch_product(&self, id: i32) -> Result<Product, PlatformError>;

    /// Creates a product with `version = 1`. Used by seeding and tests.
    async fn insert_product(&self, name: &str, stock: i32, price: Cents) -> Result<Product, PlatformError>;
}
