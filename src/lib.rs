pub mod analyzers;
pub mod collect;
pub mod config;
pub mod error;
pub mod fetch;
pub mod output;
pub mod pipeline;
pub mod record;
pub mod report;
