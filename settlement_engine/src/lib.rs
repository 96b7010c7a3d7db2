//! Settlement Engine
//!
//! The core library of the order-and-settlement platform. It contains the two subsystems the
//! platform lives or dies by:
//!
//! 1. **Stock-safe order placement**: [`OrderFlowApi`] allocates units from finite product stock
//!    under concurrent load without ever overselling, combining a per-row lock with an optimistic
//!    version check as defence in depth.
//! 2. **The settlement job engine**: [`JobEngine`] runs [`SettlementAggregator`] jobs on a bounded
//!    worker pool, aggregating completed payment transactions into per-merchant/per-day rollups
//!    with observable progress and cooperative cancellation.
//!
//! Storage access goes through the capability traits in [`traits`]; [`PgDatabase`] is the Postgres
//! implementation. You should never need to run SQL directly; use the public APIs instead. The
//! exception is the data types, which are defined in [`db_types`] and are public.
pub mod db_types;
pub mod pg;
pub mod traits;

mod jobs;
mod metrics;
mod order_flow;
mod settlement;

pub use jobs::{JobEngine, JobEngineConfig};
pub use order_flow::OrderFlowApi;
pub use pg::PgDatabase;
pub use settlement::{parse_window, SettlementAggregator, SettlementOutcome};
