//! The order placement flow: request validation, the atomic allocation in storage, and the
//! observable side effects (metrics, logging).
use std::sync::Arc;

use log::{debug, info};
use uuid::Uuid;

use crate::{
    db_types::{NewOrder, Order},
    metrics,
    traits::{OrderPlacement, PlatformError},
};

const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 100;

/// `OrderFlowApi` is the public API for placing and querying orders.
pub struct OrderFlowApi<B> {
    db: Arc<B>,
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: Arc<B>) -> Self {
        Self { db }
    }
}

impl<B> OrderFlowApi<B>
where
    B: OrderPlacement,
{
    /// Validates and places an order, returning the CONFIRMED order row.
    ///
    /// Contention on the product is resolved inside storage; `OutOfStock` and
    /// `ConcurrencyConflict` surface unchanged for the caller to convert into a 409.
    pub async fn create_order(&self, request: NewOrder) -> Result<Order, PlatformError> {
        validate_new_order(&request)?;
        let result = self.db.place_order(request).await;
        match &result {
            Ok(order) => {
                metrics::ORDERS_CREATED.inc();
                info!(
                    "🛒️ Order [{}] confirmed: buyer {} bought {} of product #{}",
                    order.id, order.buyer_id, order.quantity, order.product_id
                );
            },
            Err(PlatformError::OutOfStock) => {
                metrics::ORDERS_OUT_OF_STOCK.inc();
            },
            Err(e) => {
                debug!("🛒️ Order placement failed: {e}");
            },
        }
        result
    }

    pub async fn order_with_product(&self, id: Uuid) -> Result<Order, PlatformError> {
        self.db.fetch_order_with_product(id).await
    }

    /// Most-recent-first order listing. Returns the page along with the limit and offset that were
    /// actually applied, so callers can echo them back.
    pub async fn recent_orders(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<(Vec<Order>, i64, i64), PlatformError> {
        let (limit, offset) = clamp_paging(limit, offset);
        let orders = self.db.fetch_orders(limit, offset).await?;
        Ok((orders, limit, offset))
    }
}

fn validate_new_order(order: &NewOrder) -> Result<(), PlatformError> {
    if order.product_id < 1 {
        return Err(PlatformError::validation("product_id must be a positive integer"));
    }
    if order.quantity < 1 {
        return Err(PlatformError::validation("quantity must be a positive integer"));
    }
    if order.buyer_id.trim().is_empty() {
        return Err(PlatformError::validation("buyer_id must not be empty"));
    }
    Ok(())
}

/// Limit is clamped to `[1, 100]` with a default of 10; a negative offset becomes 0.
fn clamp_paging(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = offset.unwrap_or(0).max(0);
    (limit, offset)
}
