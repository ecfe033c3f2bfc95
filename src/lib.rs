//! Trading-post price tracker: feed ingestion, day-partitioned CSV
//! snapshots, commit-history backfill, and the dashboard API backend.

pub mod app;
pub mod config;
pub mod errors;
pub mod external;
pub mod logging;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
