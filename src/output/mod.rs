//! Output module for run results
//!
//! Provides the crawl summary returned by a run and its console rendering.

mod stats;

pub use stats::{print_summary, CrawlCounters, CrawlSummary};
