//! Data types produced by the aggregation pipeline.

use chrono::NaiveDate;
use serde::Serialize;

/// Per-station reduction of the raw dataset.
///
/// Means are `None` when every count in the group was missing. Net flow and
/// imbalance ratio are derived from the totals at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct StationSummary {
    pub district: String,
    pub station: String,
    pub mean_rentals: Option<f64>,
    pub total_rentals: u64,
    pub mean_returns: Option<f64>,
    pub total_returns: u64,
    pub net_flow: i64,
    pub imbalance_ratio: f64,
}

impl StationSummary {
    pub fn from_totals(
        district: impl Into<String>,
        station: impl Into<String>,
        mean_rentals: Option<f64>,
        total_rentals: u64,
        mean_returns: Option<f64>,
        total_returns: u64,
    ) -> Self {
        Self {
            district: district.into(),
            station: station.into(),
            mean_rentals,
            total_rentals,
            mean_returns,
            total_returns,
            net_flow: net_flow(total_rentals, total_returns),
            imbalance_ratio: imbalance_ratio(total_rentals, total_returns),
        }
    }

    pub fn flow_type(&self) -> FlowType {
        FlowType::of(self.net_flow)
    }
}

/// `rentals - returns`, clamped to the `i64` range.
pub fn net_flow(total_rentals: u64, total_returns: u64) -> i64 {
    let net = i128::from(total_rentals) - i128::from(total_returns);
    i64::try_from(net).unwrap_or(if net < 0 { i64::MIN } else { i64::MAX })
}

/// `|rentals - returns| / (rentals + returns)`, with 0/0 defined as 0.
pub fn imbalance_ratio(total_rentals: u64, total_returns: u64) -> f64 {
    if total_rentals == 0 && total_returns == 0 {
        return 0.0;
    }
    let activity = total_rentals as f64 + total_returns as f64;
    total_rentals.abs_diff(total_returns) as f64 / activity
}

/// Direction of a station's net flow. Zero net flow counts as outflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowType {
    /// More bikes returned than rented.
    Inflow,
    /// More bikes rented than returned.
    Outflow,
}

impl FlowType {
    pub fn of(net_flow: i64) -> Self {
        if net_flow < 0 {
            FlowType::Inflow
        } else {
            FlowType::Outflow
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FlowType::Inflow => "inflow",
            FlowType::Outflow => "outflow",
        }
    }
}

/// Citywide totals for one day.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub rentals: u64,
    pub returns: u64,
    pub is_weekend: bool,
}

/// Mean daily rentals on weekdays versus weekends.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeekSplit {
    pub weekday_mean: Option<f64>,
    pub weekend_mean: Option<f64>,
    /// How much lower weekends are, in percent of the weekday mean.
    pub weekend_decrease_pct: Option<f64>,
}

/// A day whose rentals fell outside `expected ± k·σ`.
#[derive(Debug, Clone, PartialEq)]
pub struct Anomaly {
    pub date: NaiveDate,
    pub rentals: u64,
    pub expected: f64,
    pub lower: f64,
    pub upper: f64,
    pub deviation_pct: Option<f64>,
}

/// Mean rentals and returns per raw row within one district.
#[derive(Debug, Clone, PartialEq)]
pub struct DistrictAverage {
    pub district: String,
    pub mean_rentals: Option<f64>,
    pub mean_returns: Option<f64>,
}

/// Per-district roll-up of station summaries.
#[derive(Debug, Clone, PartialEq)]
pub struct DistrictSummary {
    pub district: String,
    pub mean_station_rentals: Option<f64>,
    pub mean_station_returns: Option<f64>,
    pub total_rentals: u64,
    pub total_returns: u64,
    pub mean_imbalance: f64,
    pub stations: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlowBreakdown {
    pub inflow: usize,
    pub outflow: usize,
}

/// Concentration of demand across stations.
#[derive(Debug, Clone, PartialEq)]
pub struct StationEfficiency {
    pub stations: usize,
    pub mean_total_rentals: Option<f64>,
    pub median_total_rentals: Option<f64>,
    pub top: Vec<StationSummary>,
    pub bottom: Vec<StationSummary>,
    /// Number of stations in the top 20%.
    pub pareto_stations: usize,
    /// Share of all rentals taken by those stations, in percent.
    pub pareto_share_pct: Option<f64>,
}
