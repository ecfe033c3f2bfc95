use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Chart resolution for history and stats queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// Every stored observation.
    Raw,
    /// One point per calendar day, the mean of that day's prices.
    Daily,
}

impl Default for Granularity {
    fn default() -> Self {
        Granularity::Raw
    }
}

/// One chart point.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SeriesPoint {
    pub time: DateTime<Utc>,
    pub price: f64,
}

/// Selectable date bounds for one item, alongside the dataset-wide bounds.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ItemDateRange {
    pub global_min: NaiveDate,
    pub global_max: NaiveDate,
    pub item_min: NaiveDate,
    pub item_max: NaiveDate,
}
