//! Rebalancing views over station summaries: imbalance ranking, flow
//! direction and demand concentration.

use crate::analyzers::aggregate::{bottom_n_by, sort_desc_by, top_n_by};
use crate::analyzers::types::{FlowBreakdown, FlowType, StationEfficiency, StationSummary};
use crate::analyzers::utility::{mean, median, pct, saturating_sum};

/// Fraction of stations counted as "the top" in the Pareto check.
pub const PARETO_FRACTION: f64 = 0.2;

/// Stations with the highest imbalance ratio.
pub fn top_imbalanced(summaries: &[StationSummary], n: usize) -> Vec<StationSummary> {
    top_n_by(summaries, n, |s| s.imbalance_ratio)
}

pub fn flow_breakdown(summaries: &[StationSummary]) -> FlowBreakdown {
    summaries
        .iter()
        .fold(FlowBreakdown::default(), |mut acc, s| {
            match s.flow_type() {
                FlowType::Inflow => acc.inflow += 1,
                FlowType::Outflow => acc.outflow += 1,
            }
            acc
        })
}

/// Outflow stations with the largest positive net flow.
pub fn top_outflow(summaries: &[StationSummary], n: usize) -> Vec<StationSummary> {
    let outflow: Vec<StationSummary> = summaries
        .iter()
        .filter(|s| s.flow_type() == FlowType::Outflow)
        .cloned()
        .collect();
    top_n_by(&outflow, n, |s| s.net_flow as f64)
}

/// Inflow stations with the most negative net flow.
pub fn top_inflow(summaries: &[StationSummary], n: usize) -> Vec<StationSummary> {
    let inflow: Vec<StationSummary> = summaries
        .iter()
        .filter(|s| s.flow_type() == FlowType::Inflow)
        .cloned()
        .collect();
    bottom_n_by(&inflow, n, |s| s.net_flow as f64)
}

/// Counts stations whose imbalance ratio is strictly above `threshold`.
pub fn count_above(summaries: &[StationSummary], threshold: f64) -> usize {
    summaries
        .iter()
        .filter(|s| s.imbalance_ratio > threshold)
        .count()
}

pub fn station_efficiency(summaries: &[StationSummary], n: usize) -> StationEfficiency {
    let totals: Vec<f64> = summaries.iter().map(|s| s.total_rentals as f64).collect();

    let mut ranked = summaries.to_vec();
    sort_desc_by(&mut ranked, |s| s.total_rentals as f64);

    let pareto_stations = (summaries.len() as f64 * PARETO_FRACTION).floor() as usize;
    let pareto_sum = saturating_sum(ranked.iter().take(pareto_stations).map(|s| s.total_rentals));
    let grand_total = saturating_sum(summaries.iter().map(|s| s.total_rentals));

    StationEfficiency {
        stations: summaries.len(),
        mean_total_rentals: mean(&totals),
        median_total_rentals: median(&totals),
        top: ranked.iter().take(n).cloned().collect(),
        bottom: bottom_n_by(summaries, n, |s| s.total_rentals as f64),
        pareto_stations,
        pareto_share_pct: pct(pareto_sum as f64, grand_total as f64),
    }
}

/// Share of all rentals taken by the given stations, in percent.
pub fn rental_share(part: &[StationSummary], all: &[StationSummary]) -> Option<f64> {
    let part = saturating_sum(part.iter().map(|s| s.total_rentals));
    let all = saturating_sum(all.iter().map(|s| s.total_rentals));
    pct(part as f64, all as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn station(name: &str, rent: u64, rtn: u64) -> StationSummary {
        StationSummary::from_totals("강남구", name, None, rent, None, rtn)
    }

    fn sample() -> Vec<StationSummary> {
        vec![
            station("a", 10, 30),
            station("b", 50, 10),
            station("c", 0, 0),
            station("d", 20, 20),
            station("e", 100, 60),
        ]
    }

    #[test]
    fn test_top_imbalanced_ranks_zero_activity_last() {
        let top: Vec<_> = top_imbalanced(&sample(), 5)
            .into_iter()
            .map(|s| s.station)
            .collect();
        // b: 40/60, a: 20/40, e: 40/160, then c and d at 0 in input order.
        assert_eq!(top, vec!["b", "a", "e", "c", "d"]);
    }

    #[test]
    fn test_flow_breakdown() {
        let flows = flow_breakdown(&sample());
        assert_eq!(flows.inflow, 1);
        assert_eq!(flows.outflow, 4);
    }

    #[test]
    fn test_top_outflow_and_inflow() {
        let out: Vec<_> = top_outflow(&sample(), 2).into_iter().map(|s| s.station).collect();
        assert_eq!(out, vec!["b", "e"]);

        let inflow: Vec<_> = top_inflow(&sample(), 10).into_iter().map(|s| s.station).collect();
        assert_eq!(inflow, vec!["a"]);
    }

    #[test]
    fn test_count_above_is_strict() {
        let rows = sample();
        assert_eq!(count_above(&rows, 0.5), 1);
        assert_eq!(count_above(&rows, 0.3), 2);
    }

    #[test]
    fn test_station_efficiency() {
        let eff = station_efficiency(&sample(), 2);

        assert_eq!(eff.stations, 5);
        assert_eq!(eff.mean_total_rentals, Some(36.0));
        assert_eq!(eff.median_total_rentals, Some(20.0));
        assert_eq!(eff.top[0].station, "e");
        assert_eq!(eff.bottom[0].station, "c");
        assert_eq!(eff.pareto_stations, 1);
        assert!((eff.pareto_share_pct.unwrap() - 100.0 / 180.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_efficiency_of_nothing() {
        let eff = station_efficiency(&[], 10);
        assert_eq!(eff.stations, 0);
        assert_eq!(eff.mean_total_rentals, None);
        assert_eq!(eff.pareto_share_pct, None);
    }

    #[test]
    fn test_rental_share() {
        let all = sample();
        assert_eq!(rental_share(&all, &all), Some(100.0));
        assert_eq!(rental_share(&[], &[]), None);
    }
}
