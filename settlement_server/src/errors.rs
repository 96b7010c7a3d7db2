//! Central error mapping: every error leaving a handler is converted here into the wire shape
//! `{"error": {"code", "message", "details?"}}` with a stable code and HTTP status.
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use log::error;
use serde_json::json;
use settlement_engine::traits::PlatformError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    Platform(#[from] PlatformError),
    #[error("Invalid request body")]
    InvalidRequestBody(String),
    #[error("Settlement file not found")]
    FileNotFound,
    #[error("An I/O error happened in the server. {0}")]
    IoError(#[from] std::io::Error),
}

impl ServerError {
    /// The stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            ServerError::Platform(e) => match e {
                PlatformError::Validation(_) => "VALIDATION_ERROR",
                PlatformError::ProductNotFound | PlatformError::OrderNotFound => "NOT_FOUND",
                PlatformError::JobNotFound => "JOB_NOT_FOUND",
                PlatformError::OutOfStock => "OUT_OF_STOCK",
                PlatformError::ConcurrencyConflict(_) => "CONCURRENCY_CONFLICT",
                PlatformError::JobAlreadyCancelled => "JOB_ALREADY_CANCELLED",
                PlatformError::QueueFull | PlatformError::Cancelled => "SERVICE_UNAVAILABLE",
                _ => "INTERNAL_ERROR",
            },
            ServerError::InvalidRequestBody(_) => "VALIDATION_ERROR",
            ServerError::FileNotFound => "FILE_NOT_FOUND",
            ServerError::IoError(_) => "INTERNAL_ERROR",
        }
    }

    fn details(&self) -> Option<String> {
        match self {
            ServerError::InvalidRequestBody(details) => Some(details.clone()),
            _ => None,
        }
    }

    /// Whether the public message should be replaced by a generic one. Internals only ever appear
    /// in the logs.
    fn is_opaque(&self) -> bool {
        self.status_code() == StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServerError::Platform(e) => match e {
                PlatformError::Validation(_) => StatusCode::BAD_REQUEST,
                PlatformError::ProductNotFound | PlatformError::OrderNotFound | PlatformError::JobNotFound => {
                    StatusCode::NOT_FOUND
                },
                PlatformError::OutOfStock
                | PlatformError::ConcurrencyConflict(_)
                | PlatformError::JobAlreadyCancelled => StatusCode::CONFLICT,
                PlatformError::QueueFull | PlatformError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ServerError::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            ServerError::FileNotFound => StatusCode::NOT_FOUND,
            ServerError::IoError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = if self.is_opaque() {
            error!("💻️ Internal error while handling a request: {self}");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        let mut body = json!({ "error": { "code": self.code(), "message": message } });
        if let Some(details) = self.details() {
            body["error"]["details"] = json!(details);
        }
        HttpResponse::build(self.status_code()).json(body)
    }
}
