use chrono::NaiveDate;
use std::collections::BTreeSet;
use tracing::info;

use crate::analyzers::daily::{
    ROLLING_WINDOW, daily_totals, global_anomalies, rolling_anomalies, weekday_weekend,
};
use crate::analyzers::district::{district_daily_averages, district_summary};
use crate::analyzers::grade::{MODERATE_IMBALANCE, SEVERE_IMBALANCE};
use crate::analyzers::imbalance::{
    count_above, flow_breakdown, rental_share, station_efficiency, top_imbalanced, top_inflow,
    top_outflow,
};
use crate::analyzers::types::{
    Anomaly, DailyTotal, DistrictAverage, DistrictSummary, FlowBreakdown, StationEfficiency,
    StationSummary, WeekSplit,
};
use crate::analyzers::utility::{mean, saturating_sum};
use crate::record::UsageRecord;

/// Size of the persisted imbalance ranking.
pub const IMBALANCE_TOP_N: usize = 50;
/// Size of the short rankings shown in logs and the report.
pub const REPORT_TOP_N: usize = 10;

/// Everything derived from one raw dataset and its station summaries.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub period: Option<(NaiveDate, NaiveDate)>,
    pub districts: usize,
    pub daily: Vec<DailyTotal>,
    pub week: WeekSplit,
    pub anomalies: Vec<Anomaly>,
    pub rolling_anomalies: Vec<Anomaly>,
    pub district_averages: Vec<DistrictAverage>,
    pub district_summary: Vec<DistrictSummary>,
    pub summaries: Vec<StationSummary>,
    pub top_imbalance: Vec<StationSummary>,
    pub flows: FlowBreakdown,
    pub top_outflow: Vec<StationSummary>,
    pub top_inflow: Vec<StationSummary>,
    pub efficiency: StationEfficiency,
    pub total_rentals: u64,
    pub total_returns: u64,
    pub avg_daily_rentals: Option<f64>,
    /// Stations in the imbalance ranking above the moderate threshold.
    pub moderate_imbalance: usize,
    /// Stations in the imbalance ranking above the severe threshold.
    pub severe_imbalance: usize,
    pub mean_imbalance: Option<f64>,
    /// Share of all rentals taken by the busiest stations, in percent.
    pub top_rental_share_pct: Option<f64>,
}

impl Analysis {
    pub fn days(&self) -> usize {
        self.daily.len()
    }

    pub fn busiest_district(&self) -> Option<&DistrictAverage> {
        self.district_averages.first()
    }
}

/// Runs every day-, district- and station-level analysis.
///
/// `summaries` is expected in presentation order (total rentals, descending).
pub fn analyze(records: &[UsageRecord], summaries: Vec<StationSummary>) -> Analysis {
    let daily = daily_totals(records);
    let period = daily.first().zip(daily.last()).map(|(f, l)| (f.date, l.date));
    let districts: BTreeSet<&str> = records.iter().map(|r| r.district.as_str()).collect();

    let rentals: Vec<f64> = daily.iter().map(|d| d.rentals as f64).collect();
    let ratios: Vec<f64> = summaries.iter().map(|s| s.imbalance_ratio).collect();

    let top_imbalance = top_imbalanced(&summaries, IMBALANCE_TOP_N);
    let efficiency = station_efficiency(&summaries, REPORT_TOP_N);

    let analysis = Analysis {
        period,
        districts: districts.len(),
        week: weekday_weekend(&daily),
        anomalies: global_anomalies(&daily),
        rolling_anomalies: rolling_anomalies(&daily, ROLLING_WINDOW),
        district_averages: district_daily_averages(records),
        district_summary: district_summary(&summaries),
        flows: flow_breakdown(&summaries),
        top_outflow: top_outflow(&summaries, REPORT_TOP_N),
        top_inflow: top_inflow(&summaries, REPORT_TOP_N),
        total_rentals: saturating_sum(daily.iter().map(|d| d.rentals)),
        total_returns: saturating_sum(daily.iter().map(|d| d.returns)),
        avg_daily_rentals: mean(&rentals),
        moderate_imbalance: count_above(&top_imbalance, MODERATE_IMBALANCE),
        severe_imbalance: count_above(&top_imbalance, SEVERE_IMBALANCE),
        mean_imbalance: mean(&ratios),
        top_rental_share_pct: rental_share(&efficiency.top, &summaries),
        efficiency,
        top_imbalance,
        summaries,
        daily,
    };

    info!(
        days = analysis.days(),
        stations = analysis.summaries.len(),
        districts = analysis.districts,
        total_rentals = analysis.total_rentals,
        total_returns = analysis.total_returns,
        anomalies = analysis.anomalies.len(),
        inflow = analysis.flows.inflow,
        outflow = analysis.flows.outflow,
        "Analysis complete"
    );

    analysis
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::aggregate::summarize;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, d).unwrap()
    }

    fn records() -> Vec<UsageRecord> {
        vec![
            UsageRecord::new(day(10), "강서구", "마곡나루역", Some(120), Some(40)),
            UsageRecord::new(day(10), "마포구", "합정역", Some(10), Some(30)),
            UsageRecord::new(day(11), "강서구", "마곡나루역", Some(60), Some(20)),
            UsageRecord::new(day(11), "마포구", "합정역", Some(5), Some(5)),
        ]
    }

    #[test]
    fn test_analyze_small_dataset() {
        let records = records();
        let analysis = analyze(&records, summarize(&records));

        assert_eq!(analysis.period, Some((day(10), day(11))));
        assert_eq!(analysis.days(), 2);
        assert_eq!(analysis.districts, 2);
        assert_eq!(analysis.total_rentals, 195);
        assert_eq!(analysis.total_returns, 95);
        assert_eq!(analysis.avg_daily_rentals, Some(97.5));

        // Friday vs Saturday.
        assert_eq!(analysis.week.weekday_mean, Some(130.0));
        assert_eq!(analysis.week.weekend_mean, Some(65.0));

        assert_eq!(analysis.busiest_district().unwrap().district, "강서구");
        assert_eq!(analysis.top_imbalance[0].station, "마곡나루역");
        assert_eq!(analysis.flows.inflow, 1);
        assert_eq!(analysis.flows.outflow, 1);
        assert_eq!(analysis.severe_imbalance, 0);
        assert_eq!(analysis.moderate_imbalance, 2);
        assert_eq!(analysis.top_rental_share_pct, Some(100.0));
    }

    #[test]
    fn test_analyze_nothing() {
        let analysis = analyze(&[], Vec::new());

        assert_eq!(analysis.period, None);
        assert_eq!(analysis.total_rentals, 0);
        assert_eq!(analysis.avg_daily_rentals, None);
        assert!(analysis.top_imbalance.is_empty());
        assert!(analysis.busiest_district().is_none());
    }
}
