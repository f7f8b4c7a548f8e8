//! Day-level trend analysis: citywide totals, weekday/weekend split and
//! anomaly days.

use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::BTreeMap;

use crate::analyzers::types::{Anomaly, DailyTotal, WeekSplit};
use crate::analyzers::utility::{mean, pct, sample_stddev};
use crate::record::UsageRecord;

/// Band width, in standard deviations, outside of which a day is anomalous.
pub const ANOMALY_SIGMA: f64 = 2.0;
/// Window of the centred rolling baseline.
pub const ROLLING_WINDOW: usize = 7;

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Sums rentals and returns per date, in date order. Missing counts add nothing.
pub fn daily_totals(records: &[UsageRecord]) -> Vec<DailyTotal> {
    let mut by_date: BTreeMap<NaiveDate, (u64, u64)> = BTreeMap::new();
    for record in records {
        let entry = by_date.entry(record.date).or_default();
        entry.0 = entry.0.saturating_add(record.rentals.unwrap_or(0));
        entry.1 = entry.1.saturating_add(record.returns.unwrap_or(0));
    }

    by_date
        .into_iter()
        .map(|(date, (rentals, returns))| DailyTotal {
            date,
            rentals,
            returns,
            is_weekend: is_weekend(date),
        })
        .collect()
}

pub fn weekday_weekend(totals: &[DailyTotal]) -> WeekSplit {
    let side = |weekend: bool| -> Vec<f64> {
        totals
            .iter()
            .filter(|t| t.is_weekend == weekend)
            .map(|t| t.rentals as f64)
            .collect()
    };
    let weekday_mean = mean(&side(false));
    let weekend_mean = mean(&side(true));

    let weekend_decrease_pct = match (weekday_mean, weekend_mean) {
        (Some(wd), Some(we)) => pct(wd - we, wd),
        _ => None,
    };

    WeekSplit {
        weekday_mean,
        weekend_mean,
        weekend_decrease_pct,
    }
}

fn anomaly_if_outside(day: &DailyTotal, expected: f64, sd: f64) -> Option<Anomaly> {
    let lower = expected - ANOMALY_SIGMA * sd;
    let upper = expected + ANOMALY_SIGMA * sd;
    let rentals = day.rentals as f64;

    (rentals > upper || rentals < lower).then(|| Anomaly {
        date: day.date,
        rentals: day.rentals,
        expected,
        lower,
        upper,
        deviation_pct: pct(rentals - expected, expected),
    })
}

/// Days outside the mean ± 2σ of the whole period (sample σ).
pub fn global_anomalies(totals: &[DailyTotal]) -> Vec<Anomaly> {
    let values: Vec<f64> = totals.iter().map(|t| t.rentals as f64).collect();
    let Some(m) = mean(&values) else {
        return Vec::new();
    };
    let Some(sd) = sample_stddev(&values, m) else {
        return Vec::new();
    };

    totals
        .iter()
        .filter_map(|day| anomaly_if_outside(day, m, sd))
        .collect()
}

/// Days outside a centred rolling mean ± 2σ.
///
/// Only days with a complete window on both sides are judged, so the first
/// and last `window / 2` days never appear.
pub fn rolling_anomalies(totals: &[DailyTotal], window: usize) -> Vec<Anomaly> {
    if window < 2 || totals.len() < window {
        return Vec::new();
    }
    let values: Vec<f64> = totals.iter().map(|t| t.rentals as f64).collect();
    let before = (window - 1) / 2;
    let after = window - 1 - before;

    (before..totals.len() - after)
        .filter_map(|i| {
            let slice = &values[i - before..=i + after];
            let m = mean(slice)?;
            let sd = sample_stddev(slice, m)?;
            anomaly_if_outside(&totals[i], m, sd)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, d).unwrap()
    }

    fn totals(rentals: &[u64]) -> Vec<DailyTotal> {
        // 2025-10-06 is a Monday.
        rentals
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let date = day(6 + i as u32);
                DailyTotal {
                    date,
                    rentals: *r,
                    returns: *r,
                    is_weekend: is_weekend(date),
                }
            })
            .collect()
    }

    #[test]
    fn test_weekend_detection() {
        assert!(!is_weekend(day(10)));
        assert!(is_weekend(day(11)));
        assert!(is_weekend(day(12)));
        assert!(!is_weekend(day(13)));
    }

    #[test]
    fn test_daily_totals_in_date_order() {
        let records = vec![
            UsageRecord::new(day(7), "a", "x", Some(3), Some(1)),
            UsageRecord::new(day(6), "a", "x", Some(2), None),
            UsageRecord::new(day(7), "b", "y", None, Some(4)),
        ];
        let t = daily_totals(&records);

        assert_eq!(t.len(), 2);
        assert_eq!((t[0].date, t[0].rentals, t[0].returns), (day(6), 2, 0));
        assert_eq!((t[1].date, t[1].rentals, t[1].returns), (day(7), 3, 5));
    }

    #[test]
    fn test_daily_totals_saturate() {
        let records = vec![
            UsageRecord::new(day(6), "a", "x", Some(u64::MAX), Some(2)),
            UsageRecord::new(day(6), "b", "y", Some(7), Some(3)),
        ];
        let t = daily_totals(&records);
        assert_eq!((t[0].rentals, t[0].returns), (u64::MAX, 5));
    }

    #[test]
    fn test_weekday_weekend_split() {
        let split = weekday_weekend(&totals(&[100, 100, 100, 100, 100, 50, 50]));

        assert_eq!(split.weekday_mean, Some(100.0));
        assert_eq!(split.weekend_mean, Some(50.0));
        assert_eq!(split.weekend_decrease_pct, Some(50.0));
    }

    #[test]
    fn test_weekday_only_has_no_decrease() {
        let split = weekday_weekend(&totals(&[100, 120]));
        assert_eq!(split.weekend_mean, None);
        assert_eq!(split.weekend_decrease_pct, None);
    }

    #[test]
    fn test_global_anomaly_flags_spike() {
        let mut rentals = vec![100; 10];
        rentals[4] = 1000;
        let anomalies = global_anomalies(&totals(&rentals));

        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].date, day(10));
        assert!(anomalies[0].deviation_pct.unwrap() > 0.0);
    }

    #[test]
    fn test_flat_series_has_no_anomalies() {
        assert!(global_anomalies(&totals(&[100; 7])).is_empty());
        assert!(rolling_anomalies(&totals(&[100; 9]), ROLLING_WINDOW).is_empty());
    }

    #[test]
    fn test_rolling_needs_full_window() {
        assert!(rolling_anomalies(&totals(&[1, 2, 3]), ROLLING_WINDOW).is_empty());
    }

    #[test]
    fn test_rolling_window_bounds_are_sample_based() {
        // With one spike in a 7-day window the spike sits at ~2.27σ.
        let rentals = [100, 100, 100, 1000, 100, 100, 100];
        let anomalies = rolling_anomalies(&totals(&rentals), ROLLING_WINDOW);

        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].date, day(9));
        assert!((anomalies[0].expected - 1600.0 / 7.0).abs() < 1e-9);
    }
}
