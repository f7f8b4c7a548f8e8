//! Plain-text analysis report.

use chrono::NaiveDateTime;
use std::fmt::Write;
use std::path::Path;
use tracing::info;

use crate::analyzers::Analysis;
use crate::analyzers::grade::{MODERATE_IMBALANCE, SEVERE_IMBALANCE, grade};
use crate::analyzers::types::Anomaly;
use crate::error::PipelineError;

const RULE: &str = "============================================================";

fn opt(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) => format!("{v:.decimals$}"),
        None => "n/a".to_string(),
    }
}

fn anomaly_line(out: &mut String, a: &Anomaly) {
    let _ = writeln!(
        out,
        "  {} ({}): {} rentals, expected {:.0} [{:.0}, {:.0}], deviation {}%",
        a.date,
        a.date.format("%a"),
        a.rentals,
        a.expected,
        a.lower,
        a.upper,
        opt(a.deviation_pct, 1),
    );
}

/// Renders the report body. `generated_at` is stamped in the header.
pub fn render_report(analysis: &Analysis, generated_at: NaiveDateTime) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "Seoul public bike usage report");
    let _ = writeln!(out, "Generated: {}", generated_at.format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out);

    let _ = writeln!(out, "[Overview]");
    match analysis.period {
        Some((first, last)) => {
            let _ = writeln!(out, "  Period: {first} ~ {last} ({} days)", analysis.days());
        }
        None => {
            let _ = writeln!(out, "  Period: no data");
        }
    }
    let _ = writeln!(out, "  Districts: {}", analysis.districts);
    let _ = writeln!(out, "  Stations: {}", analysis.summaries.len());
    let _ = writeln!(out, "  Total rentals: {}", analysis.total_rentals);
    let _ = writeln!(out, "  Total returns: {}", analysis.total_returns);
    let _ = writeln!(
        out,
        "  Average daily rentals: {}",
        opt(analysis.avg_daily_rentals, 0)
    );
    let _ = writeln!(out);

    let _ = writeln!(out, "[Weekday vs weekend]");
    let _ = writeln!(out, "  Weekday mean: {}", opt(analysis.week.weekday_mean, 0));
    let _ = writeln!(out, "  Weekend mean: {}", opt(analysis.week.weekend_mean, 0));
    let _ = writeln!(
        out,
        "  Weekend decrease: {}%",
        opt(analysis.week.weekend_decrease_pct, 1)
    );
    let _ = writeln!(out);

    let _ = writeln!(out, "[Districts]");
    if let Some(top) = analysis.busiest_district() {
        let _ = writeln!(
            out,
            "  Busiest district: {} (mean {} rentals per station-day)",
            top.district,
            opt(top.mean_rentals, 1)
        );
    }
    for d in &analysis.district_summary {
        let _ = writeln!(
            out,
            "  {}: {} stations, {} rentals, {} returns, mean imbalance {:.3}",
            d.district, d.stations, d.total_rentals, d.total_returns, d.mean_imbalance
        );
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "[Imbalance]");
    let _ = writeln!(
        out,
        "  Top {} stations above {MODERATE_IMBALANCE}: {}",
        analysis.top_imbalance.len(),
        analysis.moderate_imbalance
    );
    let _ = writeln!(
        out,
        "  Top {} stations above {SEVERE_IMBALANCE}: {}",
        analysis.top_imbalance.len(),
        analysis.severe_imbalance
    );
    let _ = writeln!(out, "  Mean imbalance ratio: {}", opt(analysis.mean_imbalance, 3));
    for (rank, s) in analysis.top_imbalance.iter().take(10).enumerate() {
        let _ = writeln!(
            out,
            "  {:>2}. [{}] {} / {}: ratio {:.3}, net {:+}",
            rank + 1,
            grade(s.imbalance_ratio),
            s.district,
            s.station,
            s.imbalance_ratio,
            s.net_flow
        );
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "[Net flow]");
    let _ = writeln!(
        out,
        "  Outflow stations: {}, inflow stations: {}",
        analysis.flows.outflow, analysis.flows.inflow
    );
    for s in analysis.top_outflow.iter().chain(&analysis.top_inflow) {
        let _ = writeln!(
            out,
            "  {:<7} {:+} {} / {}",
            s.flow_type().as_str(),
            s.net_flow,
            s.district,
            s.station
        );
    }
    let _ = writeln!(out);

    let eff = &analysis.efficiency;
    let _ = writeln!(out, "[Station efficiency]");
    let _ = writeln!(
        out,
        "  Mean total rentals: {}, median: {}",
        opt(eff.mean_total_rentals, 1),
        opt(eff.median_total_rentals, 1)
    );
    let _ = writeln!(
        out,
        "  Top {} stations take {}% of rentals",
        eff.top.len(),
        opt(analysis.top_rental_share_pct, 1)
    );
    let _ = writeln!(
        out,
        "  Top 20% ({} stations) take {}% of rentals",
        eff.pareto_stations,
        opt(eff.pareto_share_pct, 1)
    );
    let _ = writeln!(out);

    let _ = writeln!(out, "[Anomalies]");
    if analysis.anomalies.is_empty() && analysis.rolling_anomalies.is_empty() {
        let _ = writeln!(out, "  None detected");
    }
    if !analysis.anomalies.is_empty() {
        let _ = writeln!(out, "  Outside mean ± 2σ:");
        for a in &analysis.anomalies {
            anomaly_line(&mut out, a);
        }
    }
    if !analysis.rolling_anomalies.is_empty() {
        let _ = writeln!(out, "  Outside 7-day rolling mean ± 2σ:");
        for a in &analysis.rolling_anomalies {
            anomaly_line(&mut out, a);
        }
    }

    out
}

pub fn write_report(path: &Path, report: &str) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| PipelineError::Io(parent.to_path_buf(), e))?;
    }
    std::fs::write(path, report).map_err(|e| PipelineError::Io(path.to_path_buf(), e))?;
    info!(path = %path.display(), "Report saved");
    Ok(())
}
