//! Capability traits for platform storage backends.
//!
//! The traits split the persistence surface by concern:
//!
//! * [`OrderPlacement`]: product stock and the atomic order placement flow.
//! * [`SettlementLedger`]: transaction scans and settlement rollup upserts.
//! * [`JobStore`]: background job lifecycle rows.
//! * [`PlatformDatabase`]: the umbrella trait a full backend implements, adding health checking.
//!
//! There is a single production implementation ([`crate::PgDatabase`]); the traits exist so that
//! the engine APIs stay testable against mocks and so that each API declares exactly the storage
//! capability it needs.
mod job_store;
mod order_placement;
mod platform_database;
mod settlement_ledger;

pub use job_store::JobStore;
pub use order_placement::OrderPlacement;
pub use platform_database::{PlatformDatabase, PlatformError};
pub use settlement_ledger::SettlementLedger;
