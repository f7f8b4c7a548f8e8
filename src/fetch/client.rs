use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Request, Response};

use super::PageOutcome;

/// Transport seam: anything that can execute a prepared `reqwest` request.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}

/// Something that hands out pages of usage rows for one date.
///
/// `start` is the one-based cursor of the first row wanted. Implementations
/// never return `Err`; every problem is folded into [`PageOutcome::Failure`]
/// so callers must decide what a failed page means for their loop.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, date: NaiveDate, start: usize) -> PageOutcome;
}
