//! Record lookup API over a key-value store.
//!
//! [`query::QueryService`] answers health and single-record reads,
//! [`seed::SeedJob`] writes the demo dataset and stamps freshness. Both take a
//! [`store::SharedStore`] built once per process.

pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod models;
pub mod query;
pub mod routes;
pub mod seed;
pub mod spanner;
pub mod state;
pub mod store;
