//! Page fetching against the usage-status API.
//!
//! A single request yields a [`PageOutcome`]; the caller decides what to do
//! with each variant. There is no retry at this level.

mod basic;
mod client;
pub mod seoul;

pub use basic::BasicClient;
pub use client::{HttpClient, PageSource};
pub use seoul::{SeoulBikeApi, parse_envelope};

use thiserror::Error;

use crate::record::Page;

/// Outcome of one page request.
#[derive(Debug)]
pub enum PageOutcome {
    /// Rows came back. Fewer than a full page means the date is exhausted.
    Rows(Page),
    /// The source explicitly reported that there is no (more) data.
    Empty,
    /// The page could not be fetched or understood.
    Failure(FetchError),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network request failed for {url}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("Invalid request URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Source returned {code}: {message}")]
    Source { code: String, message: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl FetchError {
    /// Transport-level problems, as opposed to the source refusing the request.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            FetchError::Network { .. } | FetchError::HttpStatus { .. }
        )
    }
}
