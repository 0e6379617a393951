//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlPhase`: Lifecycle of a crawl run (idle, running, draining, done)
//! - `OriginState`: Per-origin pacing state used by the interval limiter

mod origin_state;
mod phase;

pub use origin_state::OriginState;
pub use phase::CrawlPhase;
