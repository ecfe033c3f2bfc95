use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tracing::info;

use crate::services::dataset_cache::CacheEntryInfo;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/cache", get(get_cache_status))
        .route("/cache/clear", post(clear_cache))
}

#[derive(Debug, Serialize)]
pub struct CacheClearResponse {
    pub message: String,
    pub entries_cleared: usize,
}

pub async fn clear_cache(State(state): State<AppState>) -> Json<CacheClearResponse> {
    info!("POST /api/admin/cache/clear - Invalidating dataset cache");
    let entries_cleared = state.dataset_cache.invalidate_all();
    Json(CacheClearResponse {
        message: "Dataset cache cleared; the next request reloads snapshots".to_string(),
        entries_cleared,
    })
}

#[derive(Debug, Serialize)]
pub struct CacheStatusResponse {
    pub source: String,
    pub ttl_secs: i64,
    pub entries: Vec<CacheEntryInfo>,
}

pub async fn get_cache_status(State(state): State<AppState>) -> Json<CacheStatusResponse> {
    info!("GET /api/admin/cache - Cache status");
    Json(CacheStatusResponse {
        source: state.config.snapshot_source.describe(),
        ttl_secs: state.config.cache_ttl_secs,
        entries: state.dataset_cache.entries(),
    })
}
