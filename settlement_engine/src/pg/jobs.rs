use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    db_types::{Job, JobStatus},
    traits::PlatformError,
};

pub async fn insert_job(job: &Job, conn: &mut PgConnection) -> Result<(), PlatformError> {
    sqlx::query(
        r#"
            INSERT INTO jobs (id, type, status, progress, processed, total, parameters)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(job.id)
    .bind(job.job_type.to_string())
    .bind(job.status.to_string())
    .bind(job.progress)
    .bind(job.processed)
    .bind(job.total)
    .bind(&job.parameters)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn fetch_job(id: Uuid, conn: &mut PgConnection) -> Result<Job, PlatformError> {
    let job = sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = $1")
        .bind(id)
        .fetch_optional(conn)
        .await?;
    job.ok_or(PlatformError::JobNotFound)
}

pub async fn set_total(id: Uuid, total: i64, conn: &mut PgConnection) -> Result<(), PlatformError> {
    sqlx::query("UPDATE jobs SET total = $1, updated_at = NOW() WHERE id = $2")
        .bind(total)
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn update_progress(
    id: Uuid,
    progress: f64,
    processed: i64,
    conn: &mut PgConnection,
) -> Result<(), PlatformError> {
    sqlx::query("UPDATE jobs SET progress = $1, processed = $2, updated_at = NOW() WHERE id = $3")
        .bind(progress)
        .bind(processed)
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn update_result(
    id: Uuid,
    result_path: &str,
    download_url: &str,
    conn: &mut PgConnection,
) -> Result<(), PlatformError> {
    sqlx::query("UPDATE jobs SET result_path = $1, download_url = $2, updated_at = NOW() WHERE id = $3")
        .bind(result_path)
        .bind(download_url)
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

/// QUEUED → RUNNING. Returns `false` when the job was no longer QUEUED (cancelled while waiting in
/// the queue, typically), in which case the caller must not run it.
pub async fn mark_started(id: Uuid, conn: &mut PgConnection) -> Result<bool, PlatformError> {
    let result = sqlx::query(
        "UPDATE jobs SET status = $1, started_at = NOW(), updated_at = NOW() WHERE id = $2 AND status = $3",
    )
    .bind(JobStatus::Running.to_string())
    .bind(id)
    .bind(JobStatus::Queued.to_string())
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// RUNNING → COMPLETED, pinning the progress fields so a COMPLETED job always reads 100% /
/// processed = total, including runs over an empty window. Returns `false` when the job left
/// RUNNING in the meantime (a cancellation won the race); terminal states stay sticky.
pub async fn mark_completed(id: Uuid, conn: &mut PgConnection) -> Result<bool, PlatformError> {
    let result = sqlx::query(
        r#"
            UPDATE jobs
            SET status = $1, progress = 100, processed = total, completed_at = NOW(), updated_at = NOW()
            WHERE id = $2 AND status = $3
        "#,
    )
    .bind(JobStatus::Completed.to_string())
    .bind(id)
    .bind(JobStatus::Running.to_string())
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// RUNNING → FAILED with the error text. Returns `false` when the job was no longer RUNNING.
pub async fn fail(id: Uuid, error: &str, conn: &mut PgConnection) -> Result<bool, PlatformError> {
    let result = sqlx::query(
        r#"
            UPDATE jobs
            SET status = $1, error = $2, completed_at = NOW(), updated_at = NOW()
            WHERE id = $3 AND status = $4
        "#,
    )
    .bind(JobStatus::Failed.to_string())
    .bind(error)
    .bind(id)
    .bind(JobStatus::Running.to_string())
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Conditional cancellation. Only QUEUED and RUNNING rows can flip to CANCELLED; terminal states
/// are sticky, and the decision is made from the statement's affected row count.
pub async fn cancel(id: Uuid, conn: &mut PgConnection) -> Result<(), PlatformError> {
    let result = sqlx::query("UPDATE jobs SET status = $1, updated_at = NOW() WHERE id = $2 AND status IN ($3, $4)")
        .bind(JobStatus::Cancelled.to_string())
        .bind(id)
        .bind(JobStatus::Queued.to_string())
        .bind(JobStatus::Running.to_string())
        .execute(conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(PlatformError::JobAlreadyCancelled);
    }
    Ok(())
}

pub async fn is_cancelled(id: Uuid, conn: &mut PgConnection) -> Result<bool, PlatformError> {
    let status: Option<String> = sqlx::query_scalar("SELECT status FROM jobs WHERE id = $1")
        .bind(id)
        .fetch_optional(conn)
        .await?;
    let status = status.ok_or(PlatformError::JobNotFound)?;
    Ok(status == JobStatus::Cancelled.to_string())
}
