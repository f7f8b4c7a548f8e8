//! CSV persistence for raw rows, station summaries and the derived tables.
//!
//! Column names follow the Seoul Open Data field names so the files line up
//! with what the API hands out.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::analyzers::Analysis;
use crate::analyzers::types::{DailyTotal, DistrictSummary, FlowType, StationSummary};
use crate::analyzers::utility::round2;
use crate::collect::DailyDataset;
use crate::error::PipelineError;
use crate::record::{UsageRecord, lenient_count};

pub const RAW_COLUMNS: &[&str] = &["STAT_DATA", "STA_LOC", "RENT_NM", "RENT_CNT", "RTN_CNT"];
pub const SUMMARY_COLUMNS: &[&str] = &[
    "STA_LOC",
    "RENT_NM",
    "AVG_RENT_CNT",
    "TOTAL_RENT_CNT",
    "AVG_RTN_CNT",
    "TOTAL_RTN_CNT",
];

/// Row of the station summary CSV. Means carry two decimals.
#[derive(Debug, Serialize, Deserialize)]
pub struct SummaryRow {
    #[serde(rename = "STA_LOC")]
    pub district: String,
    #[serde(rename = "RENT_NM")]
    pub station: String,
    #[serde(rename = "AVG_RENT_CNT")]
    pub mean_rentals: Option<f64>,
    #[serde(rename = "TOTAL_RENT_CNT", deserialize_with = "lenient_count")]
    pub total_rentals: Option<u64>,
    #[serde(rename = "AVG_RTN_CNT")]
    pub mean_returns: Option<f64>,
    #[serde(rename = "TOTAL_RTN_CNT", deserialize_with = "lenient_count")]
    pub total_returns: Option<u64>,
}

impl From<&StationSummary> for SummaryRow {
    fn from(s: &StationSummary) -> Self {
        Self {
            district: s.district.clone(),
            station: s.station.clone(),
            mean_rentals: s.mean_rentals.map(round2),
            total_rentals: Some(s.total_rentals),
            mean_returns: s.mean_returns.map(round2),
            total_returns: Some(s.total_returns),
        }
    }
}

impl From<SummaryRow> for StationSummary {
    fn from(row: SummaryRow) -> Self {
        StationSummary::from_totals(
            row.district,
            row.station,
            row.mean_rentals.filter(|m| m.is_finite()),
            row.total_rentals.unwrap_or(0),
            row.mean_returns.filter(|m| m.is_finite()),
            row.total_returns.unwrap_or(0),
        )
    }
}

/// Station summary extended with the derived flow columns.
#[derive(Serialize)]
struct FlowRow<'a> {
    #[serde(rename = "STA_LOC")]
    district: &'a str,
    #[serde(rename = "RENT_NM")]
    station: &'a str,
    #[serde(rename = "AVG_RENT_CNT")]
    mean_rentals: Option<f64>,
    #[serde(rename = "TOTAL_RENT_CNT")]
    total_rentals: u64,
    #[serde(rename = "AVG_RTN_CNT")]
    mean_returns: Option<f64>,
    #[serde(rename = "TOTAL_RTN_CNT")]
    total_returns: u64,
    #[serde(rename = "NET_FLOW")]
    net_flow: i64,
    #[serde(rename = "IMBAL_RATIO")]
    imbalance_ratio: f64,
    #[serde(rename = "FLOW_TYPE", skip_serializing_if = "Option::is_none")]
    flow_type: Option<FlowType>,
}

impl<'a> FlowRow<'a> {
    fn imbalance(s: &'a StationSummary) -> Self {
        Self {
            district: &s.district,
            station: &s.station,
            mean_rentals: s.mean_rentals.map(round2),
            total_rentals: s.total_rentals,
            mean_returns: s.mean_returns.map(round2),
            total_returns: s.total_returns,
            net_flow: s.net_flow,
            imbalance_ratio: s.imbalance_ratio,
            flow_type: None,
        }
    }

    fn with_flow_type(s: &'a StationSummary) -> Self {
        Self {
            flow_type: Some(s.flow_type()),
            ..Self::imbalance(s)
        }
    }
}

#[derive(Serialize)]
struct ShortImbalanceRow<'a> {
    #[serde(rename = "STA_LOC")]
    district: &'a str,
    #[serde(rename = "RENT_NM")]
    station: &'a str,
    #[serde(rename = "TOTAL_RENT_CNT")]
    total_rentals: u64,
    #[serde(rename = "TOTAL_RTN_CNT")]
    total_returns: u64,
    #[serde(rename = "NET_FLOW")]
    net_flow: i64,
    #[serde(rename = "IMBAL_RATIO")]
    imbalance_ratio: f64,
}

#[derive(Serialize)]
struct DistrictRow<'a> {
    #[serde(rename = "STA_LOC")]
    district: &'a str,
    #[serde(rename = "STATION_CNT")]
    stations: usize,
    #[serde(rename = "AVG_RENT_CNT")]
    mean_station_rentals: Option<f64>,
    #[serde(rename = "AVG_RTN_CNT")]
    mean_station_returns: Option<f64>,
    #[serde(rename = "TOTAL_RENT_CNT")]
    total_rentals: u64,
    #[serde(rename = "TOTAL_RTN_CNT")]
    total_returns: u64,
    #[serde(rename = "AVG_IMBAL_RATIO")]
    mean_imbalance: f64,
}

impl<'a> From<&'a DistrictSummary> for DistrictRow<'a> {
    fn from(d: &'a DistrictSummary) -> Self {
        Self {
            district: &d.district,
            stations: d.stations,
            mean_station_rentals: d.mean_station_rentals.map(round2),
            mean_station_returns: d.mean_station_returns.map(round2),
            total_rentals: d.total_rentals,
            total_returns: d.total_returns,
            mean_imbalance: d.mean_imbalance,
        }
    }
}

#[derive(Serialize)]
struct DailyRow {
    #[serde(rename = "STAT_DATA")]
    date: chrono::NaiveDate,
    #[serde(rename = "RENT_CNT")]
    rentals: u64,
    #[serde(rename = "RTN_CNT")]
    returns: u64,
    #[serde(rename = "IS_WEEKEND")]
    is_weekend: bool,
}

impl From<&DailyTotal> for DailyRow {
    fn from(d: &DailyTotal) -> Self {
        Self {
            date: d.date,
            rentals: d.rentals,
            returns: d.returns,
            is_weekend: d.is_weekend,
        }
    }
}

fn csv_error(path: &Path, e: csv::Error) -> PipelineError {
    match e.kind() {
        csv::ErrorKind::Deserialize { .. }
        | csv::ErrorKind::UnequalLengths { .. }
        | csv::ErrorKind::Utf8 { .. } => PipelineError::MalformedInput {
            path: path.to_path_buf(),
            reason: e.to_string(),
        },
        _ => PipelineError::Csv(path.to_path_buf(), e),
    }
}

/// Writes `rows` as a CSV with headers, creating parent directories.
pub fn write_rows<T, I>(path: &Path, rows: I) -> Result<usize, PipelineError>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| PipelineError::Io(parent.to_path_buf(), e))?;
    }

    let mut writer =
        csv::Writer::from_path(path).map_err(|e| PipelineError::Csv(path.to_path_buf(), e))?;
    let mut count = 0;
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| PipelineError::Csv(path.to_path_buf(), e))?;
        count += 1;
    }
    writer
        .flush()
        .map_err(|e| PipelineError::Io(path.to_path_buf(), e))?;

    debug!(path = %path.display(), rows = count, "CSV written");
    Ok(count)
}

/// Reads every row of a CSV after checking that `required` columns exist.
pub fn read_rows<T: DeserializeOwned>(
    path: &Path,
    required: &[&str],
) -> Result<Vec<T>, PipelineError> {
    if !path.exists() {
        return Err(PipelineError::MissingInput(path.to_path_buf()));
    }

    let mut reader = csv::Reader::from_path(path).map_err(|e| csv_error(path, e))?;
    let headers = reader.headers().map_err(|e| csv_error(path, e))?.clone();
    let present: Vec<&str> = headers
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim())
        .collect();

    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|col| !present.contains(col))
        .collect();
    if !missing.is_empty() {
        return Err(PipelineError::MalformedInput {
            path: path.to_path_buf(),
            reason: format!("missing column(s): {}", missing.join(", ")),
        });
    }

    reader
        .deserialize()
        .map(|row| row.map_err(|e| csv_error(path, e)))
        .collect()
}

pub fn write_raw_dataset(path: &Path, records: &[UsageRecord]) -> Result<usize, PipelineError> {
    let written = write_rows(path, records)?;
    info!(path = %path.display(), rows = written, "Raw dataset saved");
    Ok(written)
}

pub fn load_raw_dataset(path: &Path) -> Result<DailyDataset, PipelineError> {
    let records: Vec<UsageRecord> = read_rows(path, RAW_COLUMNS)?;
    info!(path = %path.display(), rows = records.len(), "Raw dataset loaded");
    Ok(DailyDataset::from_records(records))
}

pub fn write_station_summaries(
    path: &Path,
    summaries: &[StationSummary],
) -> Result<usize, PipelineError> {
    let written = write_rows(path, summaries.iter().map(SummaryRow::from))?;
    info!(path = %path.display(), stations = written, "Station summary saved");
    Ok(written)
}

pub fn load_station_summaries(path: &Path) -> Result<Vec<StationSummary>, PipelineError> {
    let rows: Vec<SummaryRow> = read_rows(path, SUMMARY_COLUMNS)?;
    Ok(rows.into_iter().map(StationSummary::from).collect())
}

/// Output locations of the analysis tables.
#[derive(Debug, Clone)]
pub struct AnalysisPaths {
    pub data_dir: PathBuf,
    pub report_dir: PathBuf,
}

impl AnalysisPaths {
    pub fn imbalance_top(&self) -> PathBuf {
        self.data_dir.join("unbal_50.csv")
    }

    pub fn net_flow(&self) -> PathBuf {
        self.data_dir.join("net_inflow_outflow.csv")
    }

    pub fn daily_trend(&self) -> PathBuf {
        self.data_dir.join("daily_trend.csv")
    }

    pub fn top10_imbalance(&self) -> PathBuf {
        self.report_dir.join("top10_imbalance.csv")
    }

    pub fn district_summary(&self) -> PathBuf {
        self.report_dir.join("district_summary.csv")
    }

    pub fn report(&self) -> PathBuf {
        self.report_dir.join("analysis_report.txt")
    }
}

/// Writes every CSV table of an [`Analysis`]; returns the files written.
pub fn write_analysis_tables(
    paths: &AnalysisPaths,
    analysis: &Analysis,
) -> Result<Vec<PathBuf>, PipelineError> {
    let imbalance = paths.imbalance_top();
    write_rows(
        &imbalance,
        analysis.top_imbalance.iter().map(FlowRow::imbalance),
    )?;

    let flows = paths.net_flow();
    write_rows(
        &flows,
        analysis.summaries.iter().map(FlowRow::with_flow_type),
    )?;

    let daily = paths.daily_trend();
    write_rows(&daily, analysis.daily.iter().map(DailyRow::from))?;

    let top10 = paths.top10_imbalance();
    write_rows(
        &top10,
        analysis.top_imbalance.iter().take(10).map(|s| ShortImbalanceRow {
            district: &s.district,
            station: &s.station,
            total_rentals: s.total_rentals,
            total_returns: s.total_returns,
            net_flow: s.net_flow,
            imbalance_ratio: s.imbalance_ratio,
        }),
    )?;

    let districts = paths.district_summary();
    write_rows(&districts, analysis.district_summary.iter().map(DistrictRow::from))?;

    let written = vec![imbalance, flows, daily, top10, districts];
    info!(files = written.len(), "Analysis tables saved");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::env;
    use std::fs;

    fn temp_path(name: &str) -> PathBuf {
        env::temp_dir().join(format!("seoul_bike_stats_{name}"))
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, d).unwrap()
    }

    #[test]
    fn test_summary_csv_layout_and_rounding() {
        let path = temp_path("summary_layout.csv");
        let _ = fs::remove_file(&path);

        let s = StationSummary::from_totals("강서구", "A", Some(10.0 / 3.0), 10, None, 0);
        write_station_summaries(&path, &[s]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(
            lines[0],
            "STA_LOC,RENT_NM,AVG_RENT_CNT,TOTAL_RENT_CNT,AVG_RTN_CNT,TOTAL_RTN_CNT"
        );
        assert_eq!(lines[1], "강서구,A,3.33,10,,0");

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_summary_round_trip_rederives_flow() {
        let path = temp_path("summary_round_trip.csv");
        let _ = fs::remove_file(&path);

        let s = StationSummary::from_totals("강서구", "A", Some(15.0), 30, Some(5.0), 10);
        write_station_summaries(&path, &[s.clone()]).unwrap();
        let back = load_station_summaries(&path).unwrap();

        assert_eq!(back, vec![s]);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_raw_dataset_round_trip() {
        let path = temp_path("raw_round_trip.csv");
        let _ = fs::remove_file(&path);

        let records = vec![
            UsageRecord::new(day(6), "중구", "시청", Some(4), None),
            UsageRecord::new(day(7), "중구", "시청", None, Some(2)),
        ];
        write_raw_dataset(&path, &records).unwrap();
        let loaded = load_raw_dataset(&path).unwrap();

        assert_eq!(loaded.records(), records.as_slice());
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_file_is_missing_input() {
        let path = temp_path("does_not_exist.csv");
        let _ = fs::remove_file(&path);

        assert!(matches!(
            load_raw_dataset(&path),
            Err(PipelineError::MissingInput(_))
        ));
    }

    #[test]
    fn test_missing_column_is_malformed_input() {
        let path = temp_path("missing_column.csv");
        fs::write(&path, "STAT_DATA,STA_LOC,RENT_CNT,RTN_CNT\n2025-10-06,중구,1,2\n").unwrap();

        match load_raw_dataset(&path) {
            Err(PipelineError::MalformedInput { reason, .. }) => assert!(reason.contains("RENT_NM")),
            other => panic!("unexpected: {other:?}"),
        }
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_bad_date_is_malformed_input() {
        let path = temp_path("bad_date.csv");
        fs::write(
            &path,
            "STAT_DATA,STA_LOC,RENT_NM,RENT_CNT,RTN_CNT\nsoon,중구,시청,1,2\n",
        )
        .unwrap();

        assert!(matches!(
            load_raw_dataset(&path),
            Err(PipelineError::MalformedInput { .. })
        ));
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_write_creates_parent_directories() {
        let dir = temp_path("nested_dir");
        let _ = fs::remove_dir_all(&dir);
        let path = dir.join("deeper").join("rows.csv");

        let written = write_raw_dataset(&path, &[]).unwrap();

        assert_eq!(written, 0);
        assert!(path.exists());
        fs::remove_dir_all(&dir).unwrap();
    }
}
