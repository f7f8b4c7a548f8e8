use std::collections::{BTreeMap, BTreeSet};

use crate::analyzers::types::{DistrictAverage, DistrictSummary, StationSummary};
use crate::analyzers::utility::{mean, mean_present, saturating_sum};
use crate::record::UsageRecord;

fn cmp_desc(a: Option<f64>, b: Option<f64>) -> std::cmp::Ordering {
    // Missing values sort last.
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    }
}

/// Mean rentals and returns per raw row in each district, busiest first.
pub fn district_daily_averages(records: &[UsageRecord]) -> Vec<DistrictAverage> {
    let mut groups: BTreeMap<&str, (Vec<Option<f64>>, Vec<Option<f64>>)> = BTreeMap::new();
    for record in records {
        let entry = groups.entry(record.district.as_str()).or_default();
        entry.0.push(record.rentals.map(|v| v as f64));
        entry.1.push(record.returns.map(|v| v as f64));
    }

    let mut averages: Vec<DistrictAverage> = groups
        .into_iter()
        .map(|(district, (rentals, returns))| DistrictAverage {
            district: district.to_string(),
            mean_rentals: mean_present(rentals),
            mean_returns: mean_present(returns),
        })
        .collect();

    averages.sort_by(|a, b| cmp_desc(a.mean_rentals, b.mean_rentals));
    averages
}

/// Rolls station summaries up to districts, sorted by total rentals descending.
pub fn district_summary(summaries: &[StationSummary]) -> Vec<DistrictSummary> {
    let mut groups: BTreeMap<&str, Vec<&StationSummary>> = BTreeMap::new();
    for s in summaries {
        groups.entry(s.district.as_str()).or_default().push(s);
    }

    let mut rows: Vec<DistrictSummary> = groups
        .into_iter()
        .map(|(district, stations)| {
            let ratios: Vec<f64> = stations.iter().map(|s| s.imbalance_ratio).collect();
            let names: BTreeSet<&str> = stations.iter().map(|s| s.station.as_str()).collect();
            DistrictSummary {
                district: district.to_string(),
                mean_station_rentals: mean_present(stations.iter().map(|s| s.mean_rentals)),
                mean_station_returns: mean_present(stations.iter().map(|s| s.mean_returns)),
                total_rentals: saturating_sum(stations.iter().map(|s| s.total_rentals)),
                total_returns: saturating_sum(stations.iter().map(|s| s.total_returns)),
                mean_imbalance: mean(&ratios).unwrap_or(0.0),
                stations: names.len(),
            }
        })
        .collect();

    rows.sort_by(|a, b| b.total_rentals.cmp(&a.total_rentals));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(district: &str, rent: Option<u64>, rtn: Option<u64>) -> UsageRecord {
        let date = NaiveDate::from_ymd_opt(2025, 10, 27).unwrap();
        UsageRecord::new(date, district, "x", rent, rtn)
    }

    #[test]
    fn test_district_daily_averages() {
        let records = vec![
            row("마포구", Some(2), Some(2)),
            row("강서구", Some(10), Some(4)),
            row("강서구", Some(20), None),
            row("중구", None, None),
        ];
        let averages = district_daily_averages(&records);

        let order: Vec<_> = averages.iter().map(|a| a.district.as_str()).collect();
        assert_eq!(order, vec!["강서구", "마포구", "중구"]);
        assert_eq!(averages[0].mean_rentals, Some(15.0));
        assert_eq!(averages[0].mean_returns, Some(4.0));
        assert_eq!(averages[2].mean_rentals, None);
    }

    #[test]
    fn test_district_summary() {
        let summaries = vec![
            StationSummary::from_totals("강서구", "A", Some(15.0), 30, Some(5.0), 10),
            StationSummary::from_totals("강서구", "B", Some(0.0), 0, Some(0.0), 0),
            StationSummary::from_totals("마포구", "C", Some(50.0), 100, Some(50.0), 100),
        ];
        let rows = district_summary(&summaries);

        assert_eq!(rows[0].district, "마포구");
        assert_eq!(rows[0].stations, 1);

        let gangseo = &rows[1];
        assert_eq!(gangseo.stations, 2);
        assert_eq!(gangseo.total_rentals, 30);
        assert_eq!(gangseo.total_returns, 10);
        assert_eq!(gangseo.mean_station_rentals, Some(7.5));
        assert_eq!(gangseo.mean_imbalance, 0.25);
    }
}
