use crate::models::{PriceStats, SeriesPoint};

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (ddof = 1). Undefined below 2 points.
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values
        .iter()
        .map(|v| (v - mean).powi(2))
        .sum::<f64>()
        / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

/// Percent change from `first` to `last`. Undefined when `first` is zero.
pub fn percent_change(first: f64, last: f64) -> Option<f64> {
    if first == 0.0 {
        return None;
    }
    Some((last - first) / first * 100.0)
}

/// Summarizes a chronologically ordered series. `None` on an empty series.
pub fn summarize(series: &[SeriesPoint]) -> Option<PriceStats> {
    let first = series.first()?;
    let last = series.last()?;
    let prices: Vec<f64> = series.iter().map(|p| p.price).collect();

    let min_price = prices.iter().copied().fold(f64::INFINITY, f64::min);
    let max_price = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean_price = mean(&prices)?;

    Some(PriceStats {
        latest_price: last.price,
        min_price,
        max_price,
        mean_price,
        std_dev: sample_std_dev(&prices),
        change_pct: percent_change(first.price, last.price),
        points: series.len(),
        first_time: first.time,
        last_time: last.time,
    })
}

// =====================
// Tests
// =====================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn series(prices: &[f64]) -> Vec<SeriesPoint> {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        prices
            .iter()
            .enumerate()
            .map(|(i, &price)| SeriesPoint {
                time: start + Duration::days(i as i64),
                price,
            })
            .collect()
    }

    #[test]
    fn test_sample_std_dev_known_value() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let std = sample_std_dev(&values).unwrap();
        // Sample variance is 32/7.
        assert!((std - (32.0_f64 / 7.0).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_std_dev_undefined_below_two_points() {
        assert!(sample_std_dev(&[]).is_none());
        assert!(sample_std_dev(&[42.0]).is_none());
        assert!(sample_std_dev(&[42.0, 42.0]).is_some());
    }

    #[test]
    fn test_percent_change_guards_zero_base() {
        assert!(percent_change(0.0, 100.0).is_none());
        let change = percent_change(100.0, 110.0).unwrap();
        assert!((change - 10.0).abs() < 1e-9);
        let drop = percent_change(200.0, 100.0).unwrap();
        assert!((drop + 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_summarize_single_point() {
        let stats = summarize(&series(&[320.0])).unwrap();
        assert_eq!(stats.points, 1);
        assert_eq!(stats.latest_price, 320.0);
        assert_eq!(stats.min_price, 320.0);
        assert_eq!(stats.max_price, 320.0);
        assert!(stats.std_dev.is_none());
        assert!(stats.change_pct.is_some());
        assert_eq!(stats.first_time, stats.last_time);
    }

    #[test]
    fn test_summarize_orders_first_and_last() {
        let stats = summarize(&series(&[100.0, 150.0, 120.0])).unwrap();
        assert_eq!(stats.latest_price, 120.0);
        assert_eq!(stats.min_price, 100.0);
        assert_eq!(stats.max_price, 150.0);
        assert!((stats.mean_price - 123.333333).abs() < 1e-4);
        assert!((stats.change_pct.unwrap() - 20.0).abs() < 1e-9);
        assert!(stats.first_time < stats.last_time);
    }

    #[test]
    fn test_summarize_empty_is_none() {
        assert!(summarize(&[]).is_none());
    }
}
