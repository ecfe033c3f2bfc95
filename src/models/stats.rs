use chrono::{DateTime, Utc};
use serde::Serialize;

/// Summary statistics over a (possibly aggregated) price series.
#[derive(Debug, Clone, Serialize)]
pub struct PriceStats {
    pub latest_price: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub mean_price: f64,
    /// Sample standard deviation (ddof = 1). `null` below 2 points.
    pub std_dev: Option<f64>,
    /// Percent change from the earliest to the latest point. `null` when the
    /// earliest price is zero.
    pub change_pct: Option<f64>,
    pub points: usize,
    pub first_time: DateTime<Utc>,
    pub last_time: DateTime<Utc>,
}
