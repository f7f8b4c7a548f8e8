//! CLI entry point for the Seoul public bike usage pipeline.
//!
//! Provides subcommands for collecting daily usage from the Seoul Open Data
//! API, reducing it to per-station summaries, and running the rebalancing
//! analysis over the saved files.

use anyhow::Result;
use chrono::Local;
use clap::{Parser, Subcommand};
use seoul_bike_stats::{
    collect::{CollectorConfig, DateRangeCollector},
    config::{ApiConfig, parse_cli_date},
    error::PipelineError,
    fetch::{BasicClient, SeoulBikeApi},
    output::AnalysisPaths,
    pipeline::{analyze_files, collect_to_csv, preprocess},
};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

const DEFAULT_START: &str = "20251006";
const DEFAULT_END: &str = "20251102";
const DEFAULT_RAW: &str = "data/raw/bike_weekly.csv";
const DEFAULT_SUMMARY: &str = "data/processed/bike_weekly_summary.csv";
const DEFAULT_DATA_DIR: &str = "data/processed";
const DEFAULT_REPORT_DIR: &str = "outputs/reports";

#[derive(Parser)]
#[command(name = "seoul_bike_stats")]
#[command(about = "Collect and analyze Seoul public bike usage", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect daily usage rows from the Seoul Open Data API
    Collect {
        /// First date to collect (YYYYMMDD)
        #[arg(long, default_value = DEFAULT_START)]
        start: String,

        /// Last date to collect, inclusive (YYYYMMDD)
        #[arg(long, default_value = DEFAULT_END)]
        end: String,

        /// Raw CSV to write
        #[arg(short, long, default_value = DEFAULT_RAW)]
        output: PathBuf,

        /// Pause after a full page before requesting the next one
        #[arg(long, default_value_t = 500)]
        delay_ms: u64,
    },
    /// Reduce the raw CSV to one row per station
    Preprocess {
        /// Raw CSV produced by `collect`
        #[arg(short, long, default_value = DEFAULT_RAW)]
        input: PathBuf,

        /// Station summary CSV to write
        #[arg(short, long, default_value = DEFAULT_SUMMARY)]
        output: PathBuf,
    },
    /// Run the daily, district and imbalance analyses
    Analyze {
        #[arg(long, default_value = DEFAULT_RAW)]
        raw: PathBuf,

        #[arg(long, default_value = DEFAULT_SUMMARY)]
        summary: PathBuf,

        /// Directory for the derived CSV tables
        #[arg(long, default_value = DEFAULT_DATA_DIR)]
        data_dir: PathBuf,

        /// Directory for the report and report tables
        #[arg(long, default_value = DEFAULT_REPORT_DIR)]
        report_dir: PathBuf,
    },
    /// Collect, preprocess and analyze with the default paths
    Run {
        #[arg(long, default_value = DEFAULT_START)]
        start: String,

        #[arg(long, default_value = DEFAULT_END)]
        end: String,

        #[arg(long, default_value_t = 500)]
        delay_ms: u64,
    },
}

/// Colored stderr plus a JSON rolling log file. The guard must outlive the run.
fn init_logging() -> Result<WorkerGuard> {
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/seoul_bike_stats.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("seoul_bike_stats.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok(); // Load .env file

    let _file_guard = match init_logging() {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("failed to initialise logging: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let cli = Cli::parse();

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Run failed: {e:#}");
            let code = e
                .downcast_ref::<PipelineError>()
                .map_or(1, PipelineError::exit_code);
            ExitCode::from(code)
        }
    }
}

async fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Collect {
            start,
            end,
            output,
            delay_ms,
        } => {
            collect(&start, &end, &output, delay_ms).await?;
        }
        Commands::Preprocess { input, output } => {
            preprocess(&input, &output)?;
        }
        Commands::Analyze {
            raw,
            summary,
            data_dir,
            report_dir,
        } => {
            let paths = AnalysisPaths {
                data_dir,
                report_dir,
            };
            analyze_files(&raw, &summary, &paths, Local::now().naive_local())?;
        }
        Commands::Run {
            start,
            end,
            delay_ms,
        } => {
            let raw = Path::new(DEFAULT_RAW);
            let summary = Path::new(DEFAULT_SUMMARY);
            collect(&start, &end, raw, delay_ms).await?;
            preprocess(raw, summary)?;
            let paths = AnalysisPaths {
                data_dir: DEFAULT_DATA_DIR.into(),
                report_dir: DEFAULT_REPORT_DIR.into(),
            };
            analyze_files(raw, summary, &paths, Local::now().naive_local())?;
        }
    }

    Ok(())
}

#[tracing::instrument(skip(output), fields(output = %output.display()))]
async fn collect(start: &str, end: &str, output: &Path, delay_ms: u64) -> Result<()> {
    let start = parse_cli_date(start)?;
    let end = parse_cli_date(end)?;

    let config = ApiConfig::from_env()?;
    info!(
        key = %config.masked_key(),
        base_url = %config.base_url,
        "API configured"
    );

    let client = BasicClient::with_timeout(config.timeout).map_err(PipelineError::HttpClient)?;
    let collector = DateRangeCollector::new(
        SeoulBikeApi::new(client, config),
        CollectorConfig {
            page_delay: Duration::from_millis(delay_ms),
        },
    );

    let dataset = collect_to_csv(&collector, start, end, output).await?;
    info!(
        rows = dataset.len(),
        failed_dates = dataset.failed_dates().count(),
        "Collection saved"
    );
    Ok(())
}
