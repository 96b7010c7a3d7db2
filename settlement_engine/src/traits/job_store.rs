use async_trait::async_trait;
use uuid::Uuid;

use crate::{db_types::Job, traits::PlatformError};

/// Background job lifecycle rows.
///
/// Status transitions are guarded in SQL: `cancel_job` only flips QUEUED/RUNNING rows, and
/// `mark_job_completed` pins progress to 100 and `processed` to `total`, so terminal states are
/// sticky and a COMPLETED job always reports a finished progress bar.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create_job(&self, job: &Job) -> Result<(), PlatformError>;

    /// Fails with [`PlatformError::JobNotFound`] when absent.
    async fn fetch_job(&self, id: Uuid) -> Result<Job, PlatformError>;

    /// Records the progress denominator once the run has counted its window.
    async fn set_job_total(&self, id: Uuid, total: i64) -> Result<(), PlatformError>;

    async fn update_job_progress(&self, id: Uuid, progress: f64, processed: i64) -> Result<(), PlatformError>;

    async fn update_job_result(&self, id: Uuid, result_path: &str, download_url: &str) -> Result<(), PlatformError>;

    /// QUEUED → RUNNING, setting `started_at`. Returns `false` when the job was no longer QUEUED
    /// (cancelled while waiting), in which case it must not be run.
    async fn mark_job_started(&self, id: Uuid) -> Result<bool, PlatformError>;

    /// RUNNING → COMPLETED, setting `completed_at` and forcing progress = 100, processed = total.
    /// Returns `false` when the job already left RUNNING (a cancellation won the race).
    async fn mark_job_completed(&self, id: Uuid) -> Result<bool, PlatformError>;

    /// RUNNING → FAILED with the error text. Returns `false` when the job already left RUNNING.
    async fn fail_job(&self, id: Uuid, error: &str) -> Result<bool, PlatformError>;

    /// Conditional QUEUED/RUNNING → CANCELLED. Zero affected rows means the job already reached a
    /// terminal state and surfaces as [`PlatformError::JobAlreadyCancelled`].
    async fn cancel_job(&self, id: Uuid) -> Result<(), PlatformError>;

    /// Whether the persisted status is CANCELLED. Polled by in-flight runs between batches.
    async fn is_job_cancelled(&self, id: Uuid) -> Result<bool, PlatformError>;
}
