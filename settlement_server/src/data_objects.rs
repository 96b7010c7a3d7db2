//! Request and response bodies for the HTTP surface.
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use settlement_engine::db_types::{Job, JobStatus, NewOrder, Order, SettlementParams};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    pub product_id: i32,
    pub quantity: i32,
    pub buyer_id: String,
}

impl From<CreateOrderRequest> for NewOrder {
    fn from(req: CreateOrderRequest) -> Self {
        NewOrder { product_id: req.product_id, buyer_id: req.buyer_id, quantity: req.quantity }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettlementJobRequest {
    pub from: String,
    pub to: String,
}

impl From<SettlementJobRequest> for SettlementParams {
    fn from(req: SettlementJobRequest) -> Self {
        SettlementParams { from: req.from, to: req.to }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PagingQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct OrderListResponse {
    pub orders: Vec<Order>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Serialize)]
pub struct JobSubmittedResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
}

#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub progress: f64,
    pub processed: i64,
    pub total: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Job> for JobStatusResponse {
    fn from(job: Job) -> Self {
        // The artifact link only appears once the job has finished producing it, and the error
        // only once the job has actually failed.
        let download_url = (job.status == JobStatus::Completed).then_some(job.download_url).flatten();
        let error = (job.status == JobStatus::Failed).then_some(job.error).flatten();
        Self {
            job_id: job.id,
            status: job.status,
            progress: job.progress,
            processed: job.processed,
            total: job.total,
            download_url,
            error,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self { message: message.into() }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub checks: BTreeMap<&'static str, String>,
    pub uptime: String,
    pub timestamp: DateTime<Utc>,
}

impl HealthResponse {
    /// Builds the payload from per-check booleans; overall health is their conjunction.
    pub fn from_checks(checks: &[(&'static str, bool)], uptime: String) -> Self {
        let healthy = checks.iter().all(|(_, ok)| *ok);
        Self {
            status: if healthy { "healthy" } else { "unhealthy" },
            version: env!("CARGO_PKG_VERSION"),
            checks: checks
                .iter()
                .map(|(name, ok)| (*name, if *ok { "healthy".to_string() } else { "unhealthy".to_string() }))
                .collect(),
            uptime,
            timestamp: Utc::now(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}
