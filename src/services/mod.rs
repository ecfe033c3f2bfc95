pub mod backfill_service;
pub mod dataset_cache;
pub mod dataset_service;
pub mod ingest_service;
pub mod normalize;
pub mod query_service;
pub mod rate_limiter;
pub mod repair_service;
pub mod snapshot_store;
pub mod stats;
