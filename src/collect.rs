//! Date-range collection: pages through every date of an inclusive range and
//! concatenates the rows into one [`DailyDataset`].

use chrono::NaiveDate;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::PipelineError;
use crate::fetch::{FetchError, PageOutcome, PageSource};
use crate::record::UsageRecord;

/// Pause between a full page and the request for the next one.
pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub page_delay: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            page_delay: DEFAULT_PAGE_DELAY,
        }
    }
}

/// How pagination ended for one date.
#[derive(Debug)]
pub enum DateStatus {
    Done,
    /// Rows gathered before the failure are kept.
    Failed(FetchError),
}

#[derive(Debug)]
pub struct DateOutcome {
    pub date: NaiveDate,
    pub rows: usize,
    pub pages: usize,
    pub status: DateStatus,
}

impl DateOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self.status, DateStatus::Failed(_))
    }
}

/// All rows of one collection run, in date order, page order and response
/// order within a page.
#[derive(Debug, Default)]
pub struct DailyDataset {
    records: Vec<UsageRecord>,
    dates: Vec<DateOutcome>,
}

impl DailyDataset {
    /// Wraps rows that were loaded from disk rather than collected.
    pub fn from_records(records: Vec<UsageRecord>) -> Self {
        Self {
            records,
            dates: Vec::new(),
        }
    }

    pub fn records(&self) -> &[UsageRecord] {
        &self.records
    }

    pub fn date_outcomes(&self) -> &[DateOutcome] {
        &self.dates
    }

    pub fn failed_dates(&self) -> impl Iterator<Item = &DateOutcome> {
        self.dates.iter().filter(|d| d.is_failed())
    }

    pub fn rows_for(&self, date: NaiveDate) -> usize {
        self.records.iter().filter(|r| r.date == date).count()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub struct DateRangeCollector<S> {
    source: S,
    config: CollectorConfig,
}

impl<S: PageSource> DateRangeCollector<S> {
    pub fn new(source: S, config: CollectorConfig) -> Self {
        Self { source, config }
    }

    /// Pages through one date until a short page, an explicit end-of-data
    /// signal or the first failure.
    #[tracing::instrument(skip(self), fields(date = %date))]
    pub async fn collect_date(&self, date: NaiveDate) -> (Vec<UsageRecord>, DateOutcome) {
        let mut records = Vec::new();
        let mut pages = 0;
        let mut cursor = 1;

        let status = loop {
            match self.source.fetch_page(date, cursor).await {
                PageOutcome::Rows(page) => {
                    pages += 1;
                    let full = page.is_full();
                    let next = page.next_start();
                    debug!(cursor, rows = page.len(), "Page received");
                    records.extend(page.records);

                    if !full {
                        break DateStatus::Done;
                    }
                    cursor = next;
                    if !self.config.page_delay.is_zero() {
                        tokio::time::sleep(self.config.page_delay).await;
                    }
                }
                PageOutcome::Empty => break DateStatus::Done,
                PageOutcome::Failure(e) => {
                    warn!(cursor, error = %e, kept = records.len(), "Page fetch failed, abandoning date");
                    break DateStatus::Failed(e);
                }
            }
        };

        if !matches!(status, DateStatus::Failed(_)) {
            info!(rows = records.len(), pages, "Date collected");
        }

        let outcome = DateOutcome {
            date,
            rows: records.len(),
            pages,
            status,
        };
        (records, outcome)
    }

    /// Collects every date from `start` to `end`, inclusive.
    ///
    /// A failed date never stops the run. A run that produced no rows at all
    /// is reported as [`PipelineError::EmptyResult`].
    pub async fn collect_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<DailyDataset, PipelineError> {
        if start > end {
            return Err(PipelineError::InvalidDateRange { start, end });
        }

        let mut dataset = DailyDataset::default();
        for date in start.iter_days().take_while(|d| *d <= end) {
            let (records, outcome) = self.collect_date(date).await;
            dataset.records.extend(records);
            dataset.dates.push(outcome);
        }

        let failed = dataset.failed_dates().count();
        info!(
            %start,
            %end,
            days = dataset.dates.len(),
            failed,
            total = dataset.len(),
            "Collection finished"
        );

        if dataset.is_empty() {
            return Err(PipelineError::EmptyResult { start, end });
        }
        Ok(dataset)
    }
}
