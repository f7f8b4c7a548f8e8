//! Station aggregation and rebalancing analysis.
//!
//! Everything here is a pure function over in-memory rows: raw usage records
//! are reduced to per-station summaries, which in turn feed the daily,
//! district and imbalance views. No I/O happens in this module.

pub mod aggregate;
pub mod analyzer;
pub mod daily;
pub mod district;
pub mod grade;
pub mod imbalance;
pub mod types;
pub mod utility;

pub use aggregate::{aggregate_stations, summarize};
pub use analyzer::{Analysis, analyze};
pub use types::StationSummary;
