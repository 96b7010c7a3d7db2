//! The HTTP shell of the order-and-settlement platform: configuration, routing, error mapping and
//! telemetry around the [`settlement_engine`] core.
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
