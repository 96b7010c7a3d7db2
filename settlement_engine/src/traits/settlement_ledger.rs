use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{
    db_types::{NewSettlement, NewTransaction, Settlement, SettlementWindow, Transaction},
    traits::PlatformError,
};

/// Transaction scans and settlement rollup persistence.
#[async_trait]
pub trait SettlementLedger: Send + Sync {
    /// Number of COMPLETED transactions whose `paid_at` falls in the window. Used as the progress
    /// denominator of a settlement run.
    async fn transaction_count(&self, window: &SettlementWindow) -> Result<i64, PlatformError>;

    /// One page of COMPLETED transactions in the window, ordered by id.
    async fn transaction_page(
        &self,
        window: &SettlementWindow,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Transaction>, PlatformError>;

    /// Multi-row insert used by the seeder and test fixtures.
    async fn bulk_insert_transactions(&self, batch: &[NewTransaction]) -> Result<(), PlatformError>;

    /// Upserts every rollup in a single storage transaction. On a `(merchant, date)` conflict the
    /// stored gross/fee/net/txn_count are ADDED to the incoming values, so re-running the same
    /// window accumulates rather than replaces.
    async fn upsert_settlements(&self, rows: &[NewSettlement]) -> Result<(), PlatformError>;

    async fn fetch_settlement(
        &self,
        merchant_id: &str,
        date: NaiveDate,
    ) -> Result<Option<Settlement>, PlatformError>;
}
