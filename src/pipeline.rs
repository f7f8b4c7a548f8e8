//! The three pipeline stages as file-to-file steps.

use chrono::{NaiveDate, NaiveDateTime};
use std::path::Path;
use tracing::{info, warn};

use crate::analyzers::analyzer::REPORT_TOP_N;
use crate::analyzers::{Analysis, StationSummary, analyze, summarize};
use crate::collect::{DailyDataset, DateRangeCollector, DateStatus};
use crate::error::PipelineError;
use crate::fetch::PageSource;
use crate::output::{
    AnalysisPaths, load_raw_dataset, load_station_summaries, write_analysis_tables,
    write_raw_dataset, write_station_summaries,
};
use crate::report::{render_report, write_report};

/// Collects `start..=end` and saves the rows as the raw CSV.
///
/// Nothing is written when the run yields no rows.
pub async fn collect_to_csv<S: PageSource>(
    collector: &DateRangeCollector<S>,
    start: NaiveDate,
    end: NaiveDate,
    output: &Path,
) -> Result<DailyDataset, PipelineError> {
    let dataset = collector.collect_range(start, end).await?;

    for outcome in dataset.failed_dates() {
        if let DateStatus::Failed(e) = &outcome.status {
            warn!(
                date = %outcome.date,
                kept = outcome.rows,
                network = e.is_network(),
                error = %e,
                "Date incomplete"
            );
        }
    }

    write_raw_dataset(output, dataset.records())?;
    Ok(dataset)
}

/// Reduces the raw CSV to the station summary CSV.
pub fn preprocess(input: &Path, output: &Path) -> Result<Vec<StationSummary>, PipelineError> {
    let dataset = load_raw_dataset(input)?;
    let summaries = summarize(dataset.records());
    write_station_summaries(output, &summaries)?;

    for (rank, s) in summaries.iter().take(REPORT_TOP_N).enumerate() {
        info!(
            rank = rank + 1,
            district = %s.district,
            station = %s.station,
            total_rentals = s.total_rentals,
            total_returns = s.total_returns,
            "Top station"
        );
    }

    Ok(summaries)
}

/// Runs every analysis over the raw and summary CSVs and writes the tables
/// and the text report.
pub fn analyze_files(
    raw: &Path,
    summary: &Path,
    paths: &AnalysisPaths,
    generated_at: NaiveDateTime,
) -> Result<Analysis, PipelineError> {
    let dataset = load_raw_dataset(raw)?;
    let summaries = load_station_summaries(summary)?;

    let analysis = analyze(dataset.records(), summaries);
    write_analysis_tables(paths, &analysis)?;

    let report = render_report(&analysis, generated_at);
    write_report(&paths.report(), &report)?;

    if let Some(top) = analysis.busiest_district() {
        info!(district = %top.district, "Busiest district");
    }
    info!(
        moderate = analysis.moderate_imbalance,
        severe = analysis.severe_imbalance,
        top_share_pct = analysis.top_rental_share_pct,
        "Imbalance overview"
    );

    Ok(analysis)
}
