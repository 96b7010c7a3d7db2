//! HTTP-side Prometheus metrics and the text exposition endpoint. Everything registers on the
//! default registry, alongside the engine's own metrics.
use std::sync::LazyLock;

use actix_web::HttpResponse;
use prometheus::{register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec, TextEncoder};

use crate::errors::ServerError;

pub static HTTP_REQUESTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests processed",
        &["method", "path", "status_code"]
    )
    .expect("http_requests_total registration")
});

pub static HTTP_REQUEST_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "http_request_duration_seconds",
        "Duration of HTTP requests in seconds",
        &["method", "path"]
    )
    .expect("http_request_duration_seconds registration")
});

pub async fn metrics_handler() -> Result<HttpResponse, ServerError> {
    let encoder = TextEncoder::new();
    let mut encoded = Vec::new();
    encoder
        .encode(&prometheus::gather(), &mut encoded)
        .map_err(|e| ServerError::Platform(settlement_engine::traits::PlatformError::Internal(e.to_string())))?;
    Ok(HttpResponse::Ok().content_type(encoder.format_type()).body(encoded))
}
