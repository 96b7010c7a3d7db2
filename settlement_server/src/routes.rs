//! Request handler definitions.
//!
//! Handlers are generic over the storage backend `B` so the endpoint tests can run them against
//! mocks; the server registers them with the concrete `PgDatabase`. Each handler validates its
//! inputs, calls through to an engine API and lets [`crate::errors::ServerError`] do the mapping
//! to the wire error shape.
use std::{
    path::Path,
    sync::LazyLock,
    time::{Duration, Instant},
};

use actix_web::{
    http::header::{ContentDisposition, ContentType, DispositionParam, DispositionType},
    web,
    HttpResponse,
};
use log::{debug, trace};
use settlement_engine::{
    traits::{PlatformDatabase, PlatformError},
    JobEngine,
    OrderFlowApi,
};
use uuid::Uuid;

use crate::{
    data_objects::{
        HealthResponse,
        JobStatusResponse,
        JobSubmittedResponse,
        MessageResponse,
        OrderListResponse,
        PagingQuery,
        SettlementJobRequest,
    },
    errors::ServerError,
};

/// Pinned when the server assembles its first app instance, so `/health` reports real uptime.
pub static STARTED_AT: LazyLock<Instant> = LazyLock::new(Instant::now);

// ----------------------------------------------   Orders  ----------------------------------------------------

pub async fn create_order<B: PlatformDatabase + 'static>(
    api: web::Data<OrderFlowApi<B>>,
    body: web::Json<crate::data_objects::CreateOrderRequest>,
) -> Result<HttpResponse, ServerError> {
    let order = api.create_order(body.into_inner().into()).await?;
    Ok(HttpResponse::Created().json(order))
}

pub async fn get_order<B: PlatformDatabase + 'static>(
    api: web::Data<OrderFlowApi<B>>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServerError> {
    let id = parse_id(&path, "order")?;
    let order = api.order_with_product(id).await?;
    Ok(HttpResponse::Ok().json(order))
}

pub async fn list_orders<B: PlatformDatabase + 'static>(
    api: web::Data<OrderFlowApi<B>>,
    query: web::Query<PagingQuery>,
) -> Result<HttpResponse, ServerError> {
    let (orders, limit, offset) = api.recent_orders(query.limit, query.offset).await?;
    Ok(HttpResponse::Ok().json(OrderListResponse { orders, limit, offset }))
}

// ----------------------------------------------    Jobs   ----------------------------------------------------

pub async fn create_settlement_job<B: PlatformDatabase + 'static>(
    engine: web::Data<JobEngine<B>>,
    body: web::Json<SettlementJobRequest>,
) -> Result<HttpResponse, ServerError> {
    let job = engine.submit_settlement(body.into_inner().into()).await?;
    Ok(HttpResponse::Accepted().json(JobSubmittedResponse { job_id: job.id, status: job.status }))
}

pub async fn get_job<B: PlatformDatabase + 'static>(
    engine: web::Data<JobEngine<B>>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServerError> {
    let id = parse_id(&path, "job")?;
    let job = engine.job(id).await?;
    Ok(HttpResponse::Ok().json(JobStatusResponse::from(job)))
}

pub async fn cancel_job<B: PlatformDatabase + 'static>(
    engine: web::Data<JobEngine<B>>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServerError> {
    let id = parse_id(&path, "job")?;
    engine.cancel(id).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::new("Job cancellation requested")))
}

// ----------------------------------------------  Downloads ----------------------------------------------------

pub async fn download_settlement<B: PlatformDatabase + 'static>(
    engine: web::Data<JobEngine<B>>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServerError> {
    let filename = path.into_inner();
    validate_report_filename(&filename)?;
    let file_path = engine.output_dir().join(&filename);
    let contents = read_report(&file_path).await?;
    debug!("💻️ Serving settlement report {filename} ({} bytes)", contents.len());
    Ok(HttpResponse::Ok()
        .content_type(ContentType::octet_stream())
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(filename)],
        })
        .body(contents))
}

/// Reports are bounded by merchants × days, so they are served from memory rather than streamed.
async fn read_report(path: &Path) -> Result<Vec<u8>, ServerError> {
    match tokio::fs::read(path).await {
        Ok(contents) => Ok(contents),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ServerError::FileNotFound),
        Err(e) => Err(ServerError::IoError(e)),
    }
}

/// A report filename is `{job uuid}.csv` and nothing else; anything that does not parse exactly is
/// rejected before the filesystem is consulted.
fn validate_report_filename(filename: &str) -> Result<Uuid, ServerError> {
    if filename.len() < 40 || !filename.ends_with(".csv") {
        return Err(PlatformError::validation("Invalid filename").into());
    }
    let stem = &filename[..filename.len() - 4];
    stem.parse::<Uuid>().map_err(|_| PlatformError::validation("Invalid job ID in filename").into())
}

// ----------------------------------------------   Health  ----------------------------------------------------

pub async fn health<B: PlatformDatabase + 'static>(db: web::Data<B>) -> Result<HttpResponse, ServerError> {
    trace!("💻️ Received health check request");
    let database_healthy = match db.health_check().await {
        Ok(()) => true,
        Err(e) => {
            debug!("💻️ Database health check failed: {e}");
            false
        },
    };
    let uptime = format_uptime(STARTED_AT.elapsed());
    let response = HealthResponse::from_checks(&[("database", database_healthy)], uptime);
    if response.is_healthy() {
        Ok(HttpResponse::Ok().json(response))
    } else {
        Ok(HttpResponse::ServiceUnavailable().json(response))
    }
}

fn format_uptime(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}h{}m{}s", secs / 3600, (secs % 3600) / 60, secs % 60)
}

// ----------------------------------------------  Helpers  ----------------------------------------------------

fn parse_id(raw: &str, entity: &str) -> Result<Uuid, ServerError> {
    raw.parse::<Uuid>().map_err(|_| PlatformError::validation(format!("Invalid {entity} ID")).into())
}
