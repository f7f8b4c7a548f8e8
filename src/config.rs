//! Explicit run configuration.
//!
//! Everything the library needs from the environment is read here once and
//! passed down; nothing deeper in the crate looks at process state.

use chrono::NaiveDate;
use std::time::Duration;

use crate::error::PipelineError;

/// Environment variable holding the Seoul Open Data API key.
pub const API_KEY_VAR: &str = "KEY";
/// Optional override for the API base URL.
pub const BASE_URL_VAR: &str = "SEOUL_API_BASE_URL";

pub const DEFAULT_BASE_URL: &str = "http://openapi.seoul.go.kr:8088";
pub const DEFAULT_SERVICE: &str = "tbCycleUseStatus";
/// Top-level envelope key the API actually answers with.
pub const RESULT_KEY: &str = "useStatus";
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Where and how to reach the usage-status endpoint.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_key: String,
    pub service: String,
    pub timeout: Duration,
}

impl ApiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            service: DEFAULT_SERVICE.to_string(),
            timeout: REQUEST_TIMEOUT,
        }
    }

    /// Reads the API key (and an optional base URL) from the environment.
    pub fn from_env() -> Result<Self, PipelineError> {
        let api_key = std::env::var(API_KEY_VAR)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(PipelineError::MissingConfig(API_KEY_VAR))?;

        let mut config = Self::new(api_key.trim());
        if let Ok(base_url) = std::env::var(BASE_URL_VAR) {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        Ok(config)
    }

    pub fn page_url(&self, date: NaiveDate, start: usize, page_size: usize) -> String {
        self.url_with_key(&self.api_key, date, start, page_size)
    }

    /// Same as [`page_url`](Self::page_url) with the key masked, for logs and errors.
    pub fn redacted_url(&self, date: NaiveDate, start: usize, page_size: usize) -> String {
        self.url_with_key(&self.masked_key(), date, start, page_size)
    }

    pub fn masked_key(&self) -> String {
        let visible: String = self.api_key.chars().take(4).collect();
        format!("{visible}...")
    }

    fn url_with_key(&self, key: &str, date: NaiveDate, start: usize, page_size: usize) -> String {
        let end = start + page_size - 1;
        format!(
            "{}/{}/json/{}/{}/{}/{}",
            self.base_url,
            key,
            self.service,
            start,
            end,
            date.format("%Y-%m-%d")
        )
    }
}

/// Parses the `YYYYMMDD` literals used for the collection window.
pub fn parse_cli_date(raw: &str) -> Result<NaiveDate, PipelineError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y%m%d")
        .map_err(|_| PipelineError::InvalidDate(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_url_layout() {
        let config = ApiConfig::new("abcdef123456");
        let date = NaiveDate::from_ymd_opt(2025, 10, 6).unwrap();

        assert_eq!(
            config.page_url(date, 1001, 1000),
            "http://openapi.seoul.go.kr:8088/abcdef123456/json/tbCycleUseStatus/1001/2000/2025-10-06"
        );
    }

    #[test]
    fn test_redacted_url_hides_key() {
        let config = ApiConfig::new("abcdef123456");
        let date = NaiveDate::from_ymd_opt(2025, 10, 6).unwrap();
        let url = config.redacted_url(date, 1, 1000);

        assert!(!url.contains("abcdef123456"));
        assert!(url.contains("/abcd.../json/"));
    }

    #[test]
    fn test_parse_cli_date() {
        assert_eq!(
            parse_cli_date("20251102").unwrap(),
            NaiveDate::from_ymd_opt(2025, 11, 2).unwrap()
        );
        assert!(matches!(
            parse_cli_date("2025-11-02"),
            Err(PipelineError::InvalidDate(_))
        ));
        assert!(parse_cli_date("20251332").is_err());
    }
}
