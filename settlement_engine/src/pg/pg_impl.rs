//! `PgDatabase` is the production storage backend: a Postgres pool plus implementations of all the
//! capability traits in [`crate::traits`].
use std::{fmt::Debug, time::Duration};

use async_trait::async_trait;
use chrono::NaiveDate;
use log::debug;
use osp_common::Cents;
use sqlx::PgPool;
use uuid::Uuid;

use super::{jobs, new_pool, orders, products, settlements, transactions};
use crate::{
    db_types::{
        Job,
        NewOrder,
        NewSettlement,
        NewTransaction,
        Order,
        Product,
        Settlement,
        SettlementWindow,
        Transaction,
    },
    traits::{JobStore, OrderPlacement, PlatformDatabase, PlatformError, SettlementLedger},
};

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct PgDatabase {
    url: String,
    pool: PgPool,
}

impl Debug for PgDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "PgDatabase ({:?})", self.pool)
    }
}

impl PgDatabase {
    pub async fn new_with_url(url: &str, max_connections: u32, min_connections: u32) -> Result<Self, PlatformError> {
        let pool = new_pool(url, max_connections, min_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    /// Applies the schema migrations embedded from `migrations/`.
    pub async fn migrate(&self) -> Result<(), PlatformError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| PlatformError::Internal(format!("Migration failed: {e}")))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl OrderPlacement for PgDatabase {
    /// The hot path. One transaction: row lock, stock check, order insert, conditional decrement.
    /// Any error (including a lost version race) rolls the whole placement back, so an order row
    /// only ever exists together with its stock deduction.
    async fn place_order(&self, new_order: NewOrder) -> Result<Order, PlatformError> {
        let mut tx = self.pool.begin().await?;
        let product = products::lock_for_update(new_order.product_id, &mut tx).await?;
        if product.stock < new_order.quantity {
            return Err(PlatformError::OutOfStock);
        }
        let total = product.price * i64::from(new_order.quantity);
        let order = orders::insert_order(Uuid::new_v4(), &new_order, total, &mut tx).await?;
        products::decrement_stock(product.id, new_order.quantity, product.version, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order [{}] committed, product #{} stock reduced by {}", order.id, product.id, new_order.quantity);
        Ok(order)
    }

    async fn fetch_order_with_product(&self, id: Uuid) -> Result<Order, PlatformError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_with_product(id, &mut conn).await
    }

    async fn fetch_orders(&self, limit: i64, offset: i64) -> Result<Vec<Order>, PlatformError> {
        let mut conn = self.pool.acquire().await?;
        orders::list_orders(limit, offset, &mut conn).await
    }

    async fn fetch_product(&self, id: i32) -> Result<Product, PlatformError> {
        let mut conn = self.pool.acquire().await?;
        products::fetch_product(id, &mut conn).await
    }

    async fn insert_product(&self, name: &str, stock: i32, price: Cents) -> Result<Product, PlatformError> {
        let mut conn = self.pool.acquire().await?;
        products::insert_product(name, stock, price, &mut conn).await
    }
}

#[async_trait]
impl SettlementLedger for PgDatabase {
    async fn transaction_count(&self, window: &SettlementWindow) -> Result<i64, PlatformError> {
        let mut conn = self.pool.acquire().await?;
        transactions::count_completed(window, &mut conn).await
    }

    async fn transaction_page(
        &self,
        window: &SettlementWindow,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Transaction>, PlatformError> {
        let mut conn = self.pool.acquire().await?;
        transactions::page_completed(window, offset, limit, &mut conn).await
    }

    async fn bulk_insert_transactions(&self, batch: &[NewTransaction]) -> Result<(), PlatformError> {
        let mut conn = self.pool.acquire().await?;
        transactions::bulk_insert(batch, &mut conn).await
    }

    /// All rollups of a run land in one transaction: either every row is merged or none is.
    async fn upsert_settlements(&self, rows: &[NewSettlement]) -> Result<(), PlatformError> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for row in rows {
            settlements::upsert(row, &mut tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn fetch_settlement(
        &self,
        merchant_id: &str,
        date: NaiveDate,
    ) -> Result<Option<Settlement>, PlatformError> {
        let mut conn = self.pool.acquire().await?;
        settlements::fetch_by_merchant_and_date(merchant_id, date, &mut conn).await
    }
}

#[async_trait]
impl JobStore for PgDatabase {
    async fn create_job(&self, job: &Job) -> Result<(), PlatformError> {
        let mut conn = self.pool.acquire().await?;
        jobs::insert_job(job, &mut conn).await
    }

    async fn fetch_job(&self, id: Uuid) -> Result<Job, PlatformError> {
        let mut conn = self.pool.acquire().await?;
        jobs::fetch_job(id, &mut conn).await
    }

    async fn set_job_total(&self, id: Uuid, total: i64) -> Result<(), PlatformError> {
        let mut conn = self.pool.acquire().await?;
        jobs::set_total(id, total, &mut conn).await
    }

    async fn update_job_progress(&self, id: Uuid, progress: f64, processed: i64) -> Result<(), PlatformError> {
        let mut conn = self.pool.acquire().await?;
        jobs::update_progress(id, progress, processed, &mut conn).await
    }

    async fn update_job_result(&self, id: Uuid, result_path: &str, download_url: &str) -> Result<(), PlatformError> {
        let mut conn = self.pool.acquire().await?;
        jobs::update_result(id, result_path, download_url, &mut conn).await
    }

    async fn mark_job_started(&self, id: Uuid) -> Result<bool, PlatformError> {
        let mut conn = self.pool.acquire().await?;
        jobs::mark_started(id, &mut conn).await
    }

    async fn mark_job_completed(&self, id: Uuid) -> Result<bool, PlatformError> {
        let mut conn = self.pool.acquire().await?;
        jobs::mark_completed(id, &mut conn).await
    }

    async fn fail_job(&self, id: Uuid, error: &str) -> Result<bool, PlatformError> {
        let mut conn = self.pool.acquire().await?;
        jobs::fail(id, error, &mut conn).await
    }

    async fn cancel_job(&self, id: Uuid) -> Result<(), PlatformError> {
        let mut conn = self.pool.acquire().await?;
        jobs::cancel(id, &mut conn).await
    }

    async fn is_job_cancelled(&self, id: Uuid) -> Result<bool, PlatformError> {
        let mut conn = self.pool.acquire().await?;
        jobs::is_cancelled(id, &mut conn).await
    }
}

#[async_trait]
impl PlatformDatabase for PgDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn health_check(&self) -> Result<(), PlatformError> {
        let ping = sqlx::query("SELECT 1").execute(&self.pool);
        match tokio::time::timeout(HEALTH_CHECK_TIMEOUT, ping).await {
            Ok(result) => {
                result?;
                Ok(())
            },
            Err(_) => Err(PlatformError::Internal("database health check timed out".to_string())),
        }
    }
}
