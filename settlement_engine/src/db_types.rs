//! Database-facing domain types.
//!
//! These types are shared between the storage layer, the engine APIs and the HTTP server. Status
//! enums are stored as TEXT and converted with `TryFrom<String>` so that an unexpected value in the
//! database surfaces as a decode error rather than a silent default.
use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use osp_common::Cents;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Error)]
#[error("Invalid {0} value: {1}")]
pub struct StatusConversionError(&'static str, String);

//--------------------------------------      Product       ----------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Product {
    pub id: i32,
    pub name: String,
    pub stock: i32,
    /// Unit price in minor currency units.
    pub price: Cents,
    /// Bumped on every stock mutation. Conditional updates compare against it.
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------       Orders       ----------------------------------------------------------
/// An order placement request, before any storage interaction.
#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
    pub product_id: i32,
    pub buyer_id: String,
    pub quantity: i32,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Order {
    pub id: Uuid,
    pub product_id: i32,
    pub buyer_id: String,
    pub quantity: i32,
    #[sqlx(try_from = "String")]
    pub status: OrderStatus,
    pub total_cents: Cents,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Product snapshot attached by joined lookups. Not a column.
    #[sqlx(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<Product>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Transient state while a placement transaction is in flight. Never persisted.
    Pending,
    Confirmed,
    Cancelled,
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "PENDING"),
            OrderStatus::Confirmed => write!(f, "CONFIRMED"),
            OrderStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

impl FromStr for OrderStatus {
    type Err = StatusConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "CONFIRMED" => Ok(Self::Confirmed),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(StatusConversionError("order status", other.to_string())),
        }
    }
}

impl TryFrom<String> for OrderStatus {
    type Error = StatusConversionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

//--------------------------------------    Transactions    ----------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Transaction {
    pub id: i64,
    pub merchant_id: String,
    pub amount_cents: Cents,
    pub fee_cents: Cents,
    #[sqlx(try_from = "String")]
    pub status: TransactionStatus,
    pub paid_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A transaction as produced by the seeder or an upstream payment processor, before insertion.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub merchant_id: String,
    pub amount_cents: Cents,
    pub fee_cents: Cents,
    pub status: TransactionStatus,
    pub paid_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionStatus::Pending => write!(f, "PENDING"),
            TransactionStatus::Completed => write!(f, "COMPLETED"),
            TransactionStatus::Failed => write!(f, "FAILED"),
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = StatusConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            other => Err(StatusConversionError("transaction status", other.to_string())),
        }
    }
}

impl TryFrom<String> for TransactionStatus {
    type Error = StatusConversionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

//--------------------------------------    Settlements     ----------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Settlement {
    pub id: i64,
    pub merchant_id: String,
    pub date: NaiveDate,
    pub gross_cents: Cents,
    pub fee_cents: Cents,
    pub net_cents: Cents,
    pub txn_count: i64,
    pub generated_at: DateTime<Utc>,
    pub unique_run_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One per-(merchant, day) rollup accumulated by an aggregation run, before it is upserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSettlement {
    pub merchant_id: String,
    pub date: NaiveDate,
    pub gross_cents: Cents,
    pub fee_cents: Cents,
    pub net_cents: Cents,
    pub txn_count: i64,
    pub generated_at: DateTime<Utc>,
    pub unique_run_id: Uuid,
}

/// The half-open instant window `[from, to)` a settlement run scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

//--------------------------------------        Jobs        ----------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Job {
    pub id: Uuid,
    #[sqlx(rename = "type", try_from = "String")]
    #[serde(rename = "type")]
    pub job_type: JobType,
    #[sqlx(try_from = "String")]
    pub status: JobStatus,
    /// Percentage complete, 0.00–100.00.
    pub progress: f64,
    pub processed: i64,
    pub total: i64,
    /// Opaque JSON parameter blob; for settlement jobs this is a [`SettlementParams`].
    pub parameters: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// A brand-new settlement job in QUEUED state, ready to be persisted and enqueued.
    pub fn new_settlement(params: &SettlementParams) -> Result<Self, serde_json::Error> {
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            job_type: JobType::Settlement,
            status: JobStatus::Queued,
            progress: 0.0,
            processed: 0,
            total: 0,
            parameters: serde_json::to_string(params)?,
            result_path: None,
            download_url: None,
            error: None,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobType {
    Settlement,
}

impl Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobType::Settlement => write!(f, "SETTLEMENT"),
        }
    }
}

impl FromStr for JobType {
    type Err = StatusConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SETTLEMENT" => Ok(Self::Settlement),
            other => Err(StatusConversionError("job type", other.to_string())),
        }
    }
}

impl TryFrom<String> for JobType {
    type Error = StatusConversionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Terminal states are sticky: no transition leads out of them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled)
    }
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "QUEUED"),
            JobStatus::Running => write!(f, "RUNNING"),
            JobStatus::Completed => write!(f, "COMPLETED"),
            JobStatus::Failed => write!(f, "FAILED"),
            JobStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

impl FromStr for JobStatus {
    type Err = StatusConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "QUEUED" => Ok(Self::Queued),
            "RUNNING" => Ok(Self::Running),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(StatusConversionError("job status", other.to_string())),
        }
    }
}

impl TryFrom<String> for JobStatus {
    type Error = StatusConversionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Date-range parameters of a settlement job, as submitted over HTTP and stored in `jobs.parameters`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementParams {
    /// Inclusive first calendar day, `YYYY-MM-DD`.
    pub from: String,
    /// Inclusive last calendar day, `YYYY-MM-DD`.
    pub to: String,
}
