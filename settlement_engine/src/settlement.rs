//! The settlement aggregator: scans COMPLETED transactions in a date window, rolls them up per
//! (merchant, day), persists the rollups additively and emits a CSV report.
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::{Days, NaiveDate, NaiveTime, Utc};
use log::{debug, info};
use osp_common::Cents;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    db_types::{Job, NewSettlement, SettlementParams, SettlementWindow, Transaction},
    traits::{JobStore, PlatformError, SettlementLedger},
};

/// CSV column order of the settlement report.
const REPORT_HEADER: [&str; 8] = [
    "merchant_id",
    "date",
    "gross_cents",
    "fee_cents",
    "net_cents",
    "transaction_count",
    "generated_at",
    "unique_run_id",
];

/// Rollups keyed by (merchant, day). A BTreeMap keeps the keys in exactly the order the report
/// wants them, so no separate sort pass is needed.
type RollupMap = BTreeMap<(String, NaiveDate), NewSettlement>;

/// The artifact a finished run leaves behind.
#[derive(Debug)]
pub struct SettlementOutcome {
    pub result_path: PathBuf,
    pub download_url: String,
    pub rows: usize,
}

/// `SettlementAggregator` executes one settlement job against a storage backend.
pub struct SettlementAggregator<B> {
    db: Arc<B>,
    batch_size: i64,
    output_dir: PathBuf,
}

impl<B> SettlementAggregator<B>
where
    B: SettlementLedger + JobStore,
{
    pub fn new(db: Arc<B>, batch_size: i64, output_dir: PathBuf) -> Self {
        Self { db, batch_size, output_dir }
    }

    /// Runs the aggregation loop for `job`.
    ///
    /// Progress is persisted after every batch. Cancellation is checked before each batch against
    /// both the cooperative token and the persisted job status; either aborts the run with
    /// [`PlatformError::Cancelled`]. The rollup upsert is the only transactional write and happens
    /// before the CSV is created, so an existing report always implies committed rollups.
    pub async fn run(&self, job: &Job, token: &CancellationToken) -> Result<SettlementOutcome, PlatformError> {
        let params: SettlementParams = serde_json::from_str(&job.parameters)
            .map_err(|e| PlatformError::validation(format!("invalid job parameters: {e}")))?;
        let window = parse_window(&params)?;

        let total = self.db.transaction_count(&window).await?;
        self.db.set_job_total(job.id, total).await?;
        info!("🧮️ Settlement job [{}]: {total} transactions in window {} to {}", job.id, params.from, params.to);

        let mut rollups = RollupMap::new();
        let mut processed: i64 = 0;
        let mut offset: i64 = 0;
        loop {
            self.ensure_live(job.id, token).await?;
            let page = self.db.transaction_page(&window, offset, self.batch_size).await?;
            if page.is_empty() {
                break;
            }
            fold_batch(&mut rollups, &page);
            processed += page.len() as i64;
            offset += self.batch_size;
            let progress = if total == 0 { 100.0 } else { processed as f64 / total as f64 * 100.0 };
            self.db.update_job_progress(job.id, progress, processed).await?;
            debug!("🧮️ Job [{}]: {processed}/{total} transactions folded ({progress:.2}%)", job.id);
        }

        self.ensure_live(job.id, token).await?;
        let rows: Vec<NewSettlement> = rollups.into_values().collect();
        self.db.upsert_settlements(&rows).await?;

        fs::create_dir_all(&self.output_dir)?;
        let result_path = self.output_dir.join(format!("{}.csv", job.id));
        write_report(&result_path, &rows)?;
        let download_url = format!("/downloads/{}.csv", job.id);
        self.db.update_job_result(job.id, &result_path.to_string_lossy(), &download_url).await?;

        info!("🧮️ Settlement job [{}] complete: {} rollups written to {}", job.id, rows.len(), result_path.display());
        Ok(SettlementOutcome { result_path, download_url, rows: rows.len() })
    }

    async fn ensure_live(&self, job_id: Uuid, token: &CancellationToken) -> Result<(), PlatformError> {
        if token.is_cancelled() {
            return Err(PlatformError::Cancelled);
        }
        if self.db.is_job_cancelled(job_id).await? {
            return Err(PlatformError::Cancelled);
        }
        Ok(())
    }
}

/// Parses the inclusive `[from, to]` calendar range into the half-open instant window
/// `[from 00:00, to+1d 00:00)`, all in UTC.
pub fn parse_window(params: &SettlementParams) -> Result<SettlementWindow, PlatformError> {
    let from = parse_date(&params.from, "from")?;
    let to = parse_date(&params.to, "to")?;
    if to < from {
        return Err(PlatformError::validation("to date must not be before from date"));
    }
    let to_exclusive = to
        .checked_add_days(Days::new(1))
        .ok_or_else(|| PlatformError::validation("to date is out of range"))?;
    Ok(SettlementWindow {
        from: from.and_time(NaiveTime::MIN).and_utc(),
        to: to_exclusive.and_time(NaiveTime::MIN).and_utc(),
    })
}

fn parse_date(value: &str, field: &str) -> Result<NaiveDate, PlatformError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| PlatformError::validation(format!("invalid {field} date format, expected YYYY-MM-DD")))
}

/// Folds one transaction page into the rollup map. Aggregation is commutative and associative per
/// key, so batch boundaries never change the sums.
fn fold_batch(rollups: &mut RollupMap, page: &[Transaction]) {
    for txn in page {
        let date = txn.paid_at.date_naive();
        let entry = rollups.entry((txn.merchant_id.clone(), date)).or_insert_with(|| NewSettlement {
            merchant_id: txn.merchant_id.clone(),
            date,
            gross_cents: Cents::ZERO,
            fee_cents: Cents::ZERO,
            net_cents: Cents::ZERO,
            txn_count: 0,
            generated_at: Utc::now(),
            unique_run_id: Uuid::new_v4(),
        });
        entry.gross_cents += txn.amount_cents;
        entry.fee_cents += txn.fee_cents;
        entry.net_cents += txn.amount_cents - txn.fee_cents;
        entry.txn_count += 1;
    }
}

/// Writes the report: a header row, then one row per rollup in (merchant, date) order. UTF-8,
/// LF line endings, raw integer minor units.
fn write_report(path: &Path, rows: &[NewSettlement]) -> Result<(), PlatformError> {
    let mut writer = csv::WriterBuilder::new().terminator(csv::Terminator::Any(b'\n')).from_path(path)?;
    writer.write_record(REPORT_HEADER)?;
    for row in rows {
        writer.write_record(&[
            row.merchant_id.clone(),
            row.date.to_string(),
            row.gross_cents.value().to_string(),
            row.fee_cents.value().to_string(),
            row.net_cents.value().to_string(),
            row.txn_count.to_string(),
            row.generated_at.to_rfc3339(),
            row.unique_run_id.to_string(),
        ])?;
    }
    writer.flush().map_err(PlatformError::Io)?;
    Ok(())
}
