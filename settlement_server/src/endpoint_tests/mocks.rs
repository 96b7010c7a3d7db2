use chrono::NaiveDate;
use async_trait::async_trait;
use mockall::mock;
use osp_common::Cents;
use settlement_engine::{
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
use uuid::Uuid;

mock! {
    pub Platform {}

    #[async_trait]
    impl OrderPlacement for Platform {
        async fn place_order(&self, order: NewOrder) -> Result<Order, PlatformError>;
        async fn fetch_order_with_product(&self, id: Uuid) -> Result<Order, PlatformError>;
        async fn fetch_orders(&self, limit: i64, offset: i64) -> Result<Vec<Order>, PlatformError>;
        async fn fetch_product(&self, id: i32) -> Result<Product, PlatformError>;
        async fn insert_product(&self, name: &str, stock: i32, price: Cents) -> Result<Product, PlatformError>;
    }

    #[async_trait]
    impl SettlementLedger for Platform {
        async fn transaction_count(&self, window: &SettlementWindow) -> Result<i64, PlatformError>;
        async fn transaction_page(
            &self,
            window: &SettlementWindow,
            offset: i64,
            limit: i64,
        ) -> Result<Vec<Transaction>, PlatformError>;
        async fn bulk_insert_transactions(&self, batch: &[NewTransaction]) -> Result<(), PlatformError>;
        async fn upsert_settlements(&self, rows: &[NewSettlement]) -> Result<(), PlatformError>;
        async fn fetch_settlement(
            &self,
            merchant_id: &str,
            date: NaiveDate,
        ) -> Result<Option<Settlement>, PlatformError>;
    }

    #[async_trait]
    impl JobStore for Platform {
        async fn create_job(&self, job: &Job) -> Result<(), PlatformError>;
        async fn fetch_job(&self, id: Uuid) -> Result<Job, PlatformError>;
        async fn set_job_total(&self, id: Uuid, total: i64) -> Result<(), PlatformError>;
        async fn update_job_progress(&self, id: Uuid, progress: f64, processed: i64) -> Result<(), PlatformError>;
        async fn update_job_result(&self, id: Uuid, result_path: &str, download_url: &str) -> Result<(), PlatformError>;
        async fn mark_job_started(&self, id: Uuid) -> Result<bool, PlatformError>;
        async fn mark_job_completed(&self, id: Uuid) -> Result<bool, PlatformError>;
        async fn fail_job(&self, id: Uuid, error: &str) -> Result<bool, PlatformError>;
        async fn cancel_job(&self, id: Uuid) -> Result<(), PlatformError>;
        async fn is_job_cancelled(&self, id: Uuid) -> Result<bool, PlatformError>;
    }

    #[async_trait]
    impl PlatformDatabase for Platform {
        fn url(&self) -> &str;
        async fn health_check(&self) -> Result<(), PlatformError>;
    }
}
