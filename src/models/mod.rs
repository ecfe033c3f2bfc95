mod price_record;
mod query;
mod stats;

pub use price_record::{Dataset, PriceRecord};
pub use query::{Granularity, ItemDateRange, SeriesPoint};
pub use stats::PriceStats;
