use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::AppError;
use crate::models::{Dataset, Granularity, ItemDateRange, PriceRecord, PriceStats, SeriesPoint};
use crate::services::{dataset_service, query_service};
use crate::state::AppState;

const DEFAULT_RECENT_LIMIT: usize = 50;
const MAX_RECENT_LIMIT: usize = 1000;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_items))
        .route("/:name/history", get(get_history))
        .route("/:name/stats", get(get_stats))
        .route("/:name/recent", get(get_recent))
        .route("/:name/range", get(get_range))
}

#[derive(Debug, Deserialize)]
pub struct ItemsParams {
    days: Option<u32>,
    keyword: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ItemsResponse {
    pub total: usize,
    pub items: Vec<String>,
}

pub async fn list_items(
    State(state): State<AppState>,
    Query(params): Query<ItemsParams>,
) -> Result<Json<ItemsResponse>, AppError> {
    let days = params.days.unwrap_or(state.config.default_lookback_days);
    info!(
        "GET /api/items - days={} keyword={:?}",
        days, params.keyword
    );

    let dataset = dataset_service::load_cached(&state, days).await?;
    let items = query_service::item_names(&dataset, params.keyword.as_deref())?;
    Ok(Json(ItemsResponse {
        total: items.len(),
        items,
    }))
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    days: Option<u32>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    granularity: Option<Granularity>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub name: String,
    pub granularity: Granularity,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub points: Vec<SeriesPoint>,
}

pub async fn get_history(
    Path(name): Path<String>,
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryResponse>, AppError> {
    let days = params.days.unwrap_or(state.config.default_lookback_days);
    let granularity = params.granularity.unwrap_or_default();
    info!(
        "GET /api/items/{}/history - days={} granularity={:?}",
        name, days, granularity
    );

    let dataset = dataset_service::load_cached(&state, days).await?;
    let (start, end) = resolve_window(&dataset, &name, params.start, params.end)?;
    let points = query_service::item_history(&dataset, &name, start, end, granularity)?;
    Ok(Json(HistoryResponse {
        name,
        granularity,
        start,
        end,
        points,
    }))
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub name: String,
    pub granularity: Granularity,
    pub start: NaiveDate,
    pub end: NaiveDate,
    #[serde(flatten)]
    pub stats: PriceStats,
}

pub async fn get_stats(
    Path(name): Path<String>,
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<StatsResponse>, AppError> {
    let days = params.days.unwrap_or(state.config.default_lookback_days);
    let granularity = params.granularity.unwrap_or_default();
    info!(
        "GET /api/items/{}/stats - days={} granularity={:?}",
        name, days, granularity
    );

    let dataset = dataset_service::load_cached(&state, days).await?;
    let (start, end) = resolve_window(&dataset, &name, params.start, params.end)?;
    let stats = query_service::item_stats(&dataset, &name, start, end, granularity)?;
    Ok(Json(StatsResponse {
        name,
        granularity,
        start,
        end,
        stats,
    }))
}

#[derive(Debug, Deserialize)]
pub struct RecentParams {
    days: Option<u32>,
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct RecentResponse {
    pub name: String,
    pub total: usize,
    pub records: Vec<PriceRecord>,
}

pub async fn get_recent(
    Path(name): Path<String>,
    State(state): State<AppState>,
    Query(params): Query<RecentParams>,
) -> Result<Json<RecentResponse>, AppError> {
    let days = params.days.unwrap_or(state.config.default_lookback_days);
    let limit = params.limit.unwrap_or(DEFAULT_RECENT_LIMIT);
    if limit == 0 || limit > MAX_RECENT_LIMIT {
        return Err(AppError::Validation(format!(
            "limit must be within 1..={}, got {}",
            MAX_RECENT_LIMIT, limit
        )));
    }
    info!("GET /api/items/{}/recent - days={} limit={}", name, days, limit);

    let dataset = dataset_service::load_cached(&state, days).await?;
    let records = query_service::recent_records(&dataset, &name, limit)?;
    Ok(Json(RecentResponse {
        name,
        total: records.len(),
        records,
    }))
}

#[derive(Debug, Deserialize)]
pub struct RangeParams {
    days: Option<u32>,
}

pub async fn get_range(
    Path(name): Path<String>,
    State(state): State<AppState>,
    Query(params): Query<RangeParams>,
) -> Result<Json<ItemDateRange>, AppError> {
    let days = params.days.unwrap_or(state.config.default_lookback_days);
    info!("GET /api/items/{}/range - days={}", name, days);

    let dataset = dataset_service::load_cached(&state, days).await?;
    let range = query_service::date_range(&dataset, &name)?;
    Ok(Json(range))
}

// Missing bounds fill in from the item's own range, so a bare history
// request charts everything the item has in the window.
fn resolve_window(
    dataset: &Dataset,
    name: &str,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<(NaiveDate, NaiveDate), AppError> {
    let (start, end) = match (start, end) {
        (Some(start), Some(end)) => (start, end),
        _ => {
            let range = query_service::date_range(dataset, name)?;
            (
                start.unwrap_or(range.item_min),
                end.unwrap_or(range.item_max),
            )
        }
    };
    if start > end {
        return Err(AppError::Validation(format!(
            "start {} is after end {}",
            start, end
        )));
    }
    Ok((start, end))
}
