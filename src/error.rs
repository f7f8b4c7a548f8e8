use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a pipeline run.
///
/// Per-date fetch problems never show up here; they are
/// [`FetchError`](crate::fetch::FetchError)s recorded on the dataset.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Input file '{0}' does not exist")]
    MissingInput(PathBuf),

    #[error("Malformed input '{path}': {reason}")]
    MalformedInput { path: PathBuf, reason: String },

    #[error("No rows were collected between {start} and {end}")]
    EmptyResult { start: NaiveDate, end: NaiveDate },

    #[error("Start date {start} is after end date {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("Invalid date '{0}', expected YYYYMMDD")]
    InvalidDate(String),

    #[error("Environment variable '{0}' is not set")]
    MissingConfig(&'static str),

    #[error("Failed to build HTTP client")]
    HttpClient(#[source] reqwest::Error),

    #[error("I/O error on '{0}'")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("CSV error on '{0}'")]
    Csv(PathBuf, #[source] csv::Error),
}

impl PipelineError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            PipelineError::MissingInput(_) | PipelineError::MissingConfig(_) => 2,
            PipelineError::EmptyResult { .. } => 3,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let day = NaiveDate::from_ymd_opt(2025, 10, 6).unwrap();
        assert_eq!(PipelineError::MissingInput("x.csv".into()).exit_code(), 2);
        assert_eq!(PipelineError::MissingConfig("KEY").exit_code(), 2);
        assert_eq!(
            PipelineError::EmptyResult {
                start: day,
                end: day
            }
            .exit_code(),
            3
        );
        assert_eq!(
            PipelineError::InvalidDate("2025-13-01".into()).exit_code(),
            1
        );
    }
}
