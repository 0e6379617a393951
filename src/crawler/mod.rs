//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP transport and the guarded DNS hook
//! - Fetching with safety checks, robots.txt, spacing and retry logic
//! - HTML link extraction
//! - The shared frontier and per-origin interval limiter
//! - Overall crawl orchestration

mod fetcher;
mod frontier;
mod limiter;
mod orchestrator;
mod parser;
mod transport;

#[cfg(test)]
pub(crate) mod test_support;

pub use fetcher::{
    backoff_delay, FailureKind, FetchEngine, FetchOutcome, FetchSettings, ForbiddenReason,
    MAX_REMOTE_DELAY,
};
pub use frontier::{Frontier, FrontierEntry, InFlight};
pub use limiter::{IntervalLimiter, OriginTurn};
pub use orchestrator::Orchestrator;
pub use parser::{HtmlLinkExtractor, LinkExtractor};
pub use transport::{
    build_http_client, GuardedDnsResolver, HttpTransport, RawResponse, Transport, TransportError,
};
