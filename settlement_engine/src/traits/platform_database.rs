use async_trait::async_trait;
use thiserror::Error;

use crate::traits::{JobStore, OrderPlacement, SettlementLedger};

/// Error taxonomy for the whole platform.
///
/// Domain errors bubble unchanged from the storage layer through the engine APIs to the HTTP
/// handlers, where a central mapper converts them into the wire error shape. Anything not covered
/// by a domain variant is carried verbatim in `Database`/`Io`/`Internal` and rendered as an opaque
/// internal error.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("{0}")]
    Validation(String),
    #[error("Product not found")]
    ProductNotFound,
    #[error("Order not found")]
    OrderNotFound,
    #[error("Job not found")]
    JobNotFound,
    #[error("Insufficient stock")]
    OutOfStock,
    #[error("Concurrent modification detected: {0}")]
    ConcurrencyConflict(String),
    #[error("Job is already cancelled or finished")]
    JobAlreadyCancelled,
    #[error("Job queue is full")]
    QueueFull,
    #[error("Operation was cancelled")]
    Cancelled,
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Report error: {0}")]
    Csv(#[from] csv::Error),
    #[error("{0}")]
    Internal(String),
}

impl PlatformError {
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        PlatformError::Validation(msg.into())
    }
}

impl From<serde_json::Error> for PlatformError {
    fn from(e: serde_json::Error) -> Self {
        PlatformError::Internal(format!("JSON error: {e}"))
    }
}

/// The full storage capability set a platform backend provides.
#[async_trait]
pub trait PlatformDatabase: OrderPlacement + SettlementLedger + JobStore + Send + Sync {
    /// The URL of the backing database.
    fn url(&self) -> &str;

    /// Confirms storage reachability, bounded to five seconds.
    async fn health_check(&self) -> Result<(), PlatformError>;
}
