//! The Seoul Open Data `tbCycleUseStatus` endpoint.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::client::{HttpClient, PageSource};
use super::{FetchError, PageOutcome};
use crate::config::{ApiConfig, RESULT_KEY};
use crate::record::{PAGE_SIZE, Page, UsageRecord, lenient_count, parse_date};

/// Result code for a successful page.
pub const CODE_OK: &str = "INFO-000";
/// Result code the API uses for "no (more) data".
pub const CODE_NO_DATA: &str = "INFO-200";

#[derive(Debug, Deserialize)]
struct ResultCode {
    #[serde(rename = "CODE")]
    code: String,
    #[serde(rename = "MESSAGE", default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "RESULT")]
    result: Option<ResultCode>,
    #[serde(default)]
    row: Option<Vec<ApiRow>>,
}

#[derive(Debug, Deserialize)]
struct ApiRow {
    #[serde(rename = "STAT_DATA", default)]
    date: Option<String>,
    #[serde(rename = "STA_LOC", default)]
    district: Option<String>,
    #[serde(rename = "RENT_NM", default)]
    station: Option<String>,
    #[serde(rename = "RENT_ID", default)]
    station_id: Option<Value>,
    #[serde(rename = "RENT_CNT", default, deserialize_with = "lenient_count")]
    rentals: Option<u64>,
    #[serde(rename = "RTN_CNT", default, deserialize_with = "lenient_count")]
    returns: Option<u64>,
}

impl ApiRow {
    /// `None` when the row has no district or station to group by.
    fn into_record(self, requested: NaiveDate) -> Option<UsageRecord> {
        let (Some(district), Some(station)) = (self.district, self.station) else {
            return None;
        };
        let station_id = match self.station_id {
            Some(Value::String(s)) if !s.is_empty() => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        Some(UsageRecord {
            date: self.date.as_deref().and_then(parse_date).unwrap_or(requested),
            district,
            station,
            station_id,
            rentals: self.rentals,
            returns: self.returns,
        })
    }
}

/// Decodes one response body into a page outcome.
///
/// The envelope sits under `useStatus` or under the service name. A bare
/// top-level `RESULT` (what the API sends for some errors) is read as the
/// envelope itself.
pub fn parse_envelope(body: &[u8], service: &str, date: NaiveDate, start: usize) -> PageOutcome {
    match decode_envelope(body, service, date, start) {
        Ok(outcome) => outcome,
        Err(e) => PageOutcome::Failure(e),
    }
}

fn decode_envelope(
    body: &[u8],
    service: &str,
    date: NaiveDate,
    start: usize,
) -> Result<PageOutcome, FetchError> {
    let mut json: Value = serde_json::from_slice(body)
        .map_err(|e| FetchError::MalformedResponse(format!("body is not JSON: {e}")))?;

    let wrapped = [RESULT_KEY, service]
        .into_iter()
        .find_map(|key| json.get_mut(key).map(Value::take));

    let inner = match wrapped {
        Some(inner) => inner,
        None if json.get("RESULT").is_some() => json,
        None => {
            return Err(FetchError::MalformedResponse(format!(
                "neither '{RESULT_KEY}' nor '{service}' present"
            )));
        }
    };

    let envelope: Envelope = serde_json::from_value(inner)
        .map_err(|e| FetchError::MalformedResponse(format!("unexpected envelope: {e}")))?;

    if let Some(result) = envelope.result {
        match result.code.as_str() {
            CODE_NO_DATA => return Ok(PageOutcome::Empty),
            CODE_OK => {}
            _ => {
                return Err(FetchError::Source {
                    code: result.code,
                    message: result.message,
                });
            }
        }
    }

    let rows = envelope.row.unwrap_or_default();
    let received = rows.len();
    let records: Vec<UsageRecord> = rows
        .into_iter()
        .filter_map(|row| row.into_record(date))
        .collect();

    let skipped = received - records.len();
    if skipped > 0 {
        warn!(%date, start, skipped, "Rows without district or station dropped");
    }

    Ok(PageOutcome::Rows(Page::with_skipped(start, records, skipped)))
}

/// [`PageSource`] backed by the live API.
pub struct SeoulBikeApi<C> {
    client: C,
    config: ApiConfig,
}

impl<C: HttpClient> SeoulBikeApi<C> {
    pub fn new(client: C, config: ApiConfig) -> Self {
        Self { client, config }
    }

    async fn try_fetch(&self, date: NaiveDate, start: usize) -> Result<PageOutcome, FetchError> {
        let url = self.config.page_url(date, start, PAGE_SIZE);
        let redacted = self.config.redacted_url(date, start, PAGE_SIZE);

        let parsed = reqwest::Url::parse(&url).map_err(|e| FetchError::InvalidUrl {
            url: redacted.clone(),
            reason: e.to_string(),
        })?;
        let req = reqwest::Request::new(reqwest::Method::GET, parsed);

        debug!(url = %redacted, "Requesting page");
        let resp = self
            .client
            .execute(req)
            .await
            .map_err(|source| FetchError::Network {
                url: redacted.clone(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: redacted,
                status,
            });
        }

        let body = resp
            .bytes()
            .await
            .map_err(|source| FetchError::Network {
                url: redacted.clone(),
                source,
            })?;

        Ok(parse_envelope(&body, &self.config.service, date, start))
    }
}

#[async_trait]
impl<C: HttpClient> PageSource for SeoulBikeApi<C> {
    async fn fetch_page(&self, date: NaiveDate, start: usize) -> PageOutcome {
        match self.try_fetch(date, start).await {
            Ok(outcome) => outcome,
            Err(e) => PageOutcome::Failure(e),
        }
    }
}
