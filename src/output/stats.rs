//! Crawl run statistics
//!
//! Workers record every outcome into shared atomic counters; the orchestrator
//! turns them into a [`CrawlSummary`] once the run is done.

use crate::crawler::{FailureKind, FetchOutcome, ForbiddenReason};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Result of one crawl run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    /// Pages fetched successfully
    pub fetched: u64,

    /// URLs refused by robots.txt
    pub forbidden_robots: u64,

    /// URLs refused by the safety guard (including redirect targets)
    pub forbidden_unsafe: u64,

    /// URLs whose fetch failed
    pub failed: u64,

    /// URLs whose redirect led to a page this run already claimed
    pub duplicates: u64,

    /// Failure counts by kind
    pub failures_by_kind: HashMap<FailureKind, u64>,

    /// Final size of the visited set
    pub visited: usize,

    /// Links extracted from fetched pages
    pub links_discovered: u64,

    /// Links dropped because they could not be canonicalized
    pub links_invalid: u64,

    /// Wall-clock duration of the run
    pub elapsed: Duration,

    /// Whether the run ended on the stop signal
    pub stopped: bool,
}

impl CrawlSummary {
    pub fn forbidden(&self) -> u64 {
        self.forbidden_robots + self.forbidden_unsafe
    }

    /// Number of URLs that reached a terminal outcome
    pub fn processed(&self) -> u64 {
        self.fetched + self.forbidden() + self.failed + self.duplicates
    }
}

/// Shared counters updated by workers during a run
#[derive(Debug, Default)]
pub struct CrawlCounters {
    fetched: AtomicU64,
    forbidden_robots: AtomicU64,
    forbidden_unsafe: AtomicU64,
    failed: AtomicU64,
    duplicates: AtomicU64,
    processed: AtomicU64,
    failures_by_kind: Mutex<HashMap<FailureKind, u64>>,
    links_discovered: AtomicU64,
    links_invalid: AtomicU64,
}

impl CrawlCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a terminal outcome and returns the number of outcomes so far
    pub fn record(&self, outcome: &FetchOutcome) -> u64 {
        match outcome {
            FetchOutcome::Success { .. } => {
                self.fetched.fetch_add(1, Ordering::Relaxed);
            }
            FetchOutcome::Forbidden(ForbiddenReason::Robots) => {
                self.forbidden_robots.fetch_add(1, Ordering::Relaxed);
            }
            FetchOutcome::Forbidden(ForbiddenReason::Unsafe) => {
                self.forbidden_unsafe.fetch_add(1, Ordering::Relaxed);
            }
            FetchOutcome::Failed(kind) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                let mut by_kind = self
                    .failures_by_kind
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
                *by_kind.entry(*kind).or_insert(0) += 1;
            }
            FetchOutcome::Duplicate { .. } => {
                self.duplicates.fetch_add(1, Ordering::Relaxed);
            }
        }
        // One counter so concurrent workers each observe a distinct count
        self.processed.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn add_links(&self, discovered: u64, invalid: u64) {
        self.links_discovered.fetch_add(discovered, Ordering::Relaxed);
        self.links_invalid.fetch_add(invalid, Ordering::Relaxed);
    }

    pub fn fetched(&self) -> u64 {
        self.fetched.load(Ordering::Relaxed)
    }

    /// Builds the run summary from the current counts
    pub fn summary(&self, visited: usize, elapsed: Duration, stopped: bool) -> CrawlSummary {
        let failures_by_kind = self
            .failures_by_kind
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();

        CrawlSummary {
            fetched: self.fetched.load(Ordering::Relaxed),
            forbidden_robots: self.forbidden_robots.load(Ordering::Relaxed),
            forbidden_unsafe: self.forbidden_unsafe.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            failures_by_kind,
            visited,
            links_discovered: self.links_discovered.load(Ordering::Relaxed),
            links_invalid: self.links_invalid.load(Ordering::Relaxed),
            elapsed,
            stopped,
        }
    }
}

/// Prints the run summary to stdout in a formatted manner
pub fn print_summary(summary: &CrawlSummary) {
    println!("=== Crawl Summary ===\n");

    println!("Overview:");
    println!("  Pages fetched: {}", summary.fetched);
    println!(
        "  Forbidden: {} (robots.txt: {}, unsafe: {})",
        summary.forbidden(),
        summary.forbidden_robots,
        summary.forbidden_unsafe
    );
    println!("  Failed: {}", summary.failed);
    println!("  Redirects to visited pages: {}", summary.duplicates);
    println!("  Visited set size: {}", summary.visited);
    println!(
        "  Links discovered: {} ({} invalid)",
        summary.links_discovered, summary.links_invalid
    );
    println!();

    if !summary.failures_by_kind.is_empty() {
        println!("Failure Summary:");
        let mut failure_counts: Vec<_> = summary.failures_by_kind.iter().collect();
        failure_counts.sort_by(|a, b| b.1.cmp(a.1));

        for (kind, count) in failure_counts {
            println!("  {}: {}", kind, count);
        }
        println!();
    }

    let secs = summary.elapsed.as_secs_f64();
    let rate = if secs > 0.0 {
        summary.fetched as f64 / secs
    } else {
        0.0
    };
    println!(
        "Elapsed: {:.1}s ({:.2} pages/sec){}",
        secs,
        rate,
        if summary.stopped { ", stopped early" } else { "" }
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::url::CanonicalUrl;

    fn success() -> FetchOutcome {
        FetchOutcome::Success {
            url: CanonicalUrl::parse("https://example.com/").unwrap(),
            status: 200,
            body: String::new(),
        }
    }

    #[test]
    fn test_record_outcomes() {
        let counters = CrawlCounters::new();
        assert_eq!(counters.record(&success()), 1);
        counters.record(&FetchOutcome::Forbidden(ForbiddenReason::Robots));
        counters.record(&FetchOutcome::Forbidden(ForbiddenReason::Unsafe));
        counters.record(&FetchOutcome::Failed(FailureKind::Exhausted));
        assert_eq!(counters.record(&FetchOutcome::Failed(FailureKind::Exhausted)), 5);

        let summary = counters.summary(7, Duration::from_secs(2), false);
        assert_eq!(summary.fetched, 1);
        assert_eq!(summary.forbidden(), 2);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.failures_by_kind.get(&FailureKind::Exhausted), Some(&2));
        assert_eq!(summary.visited, 7);
        assert_eq!(summary.processed(), 5);
    }

    #[test]
    fn test_duplicate_outcome_counted() {
        let counters = CrawlCounters::new();
        counters.record(&success());
        let duplicate = FetchOutcome::Duplicate {
            url: CanonicalUrl::parse("https://example.com/a").unwrap(),
        };
        assert_eq!(counters.record(&duplicate), 2);

        let summary = counters.summary(2, Duration::ZERO, false);
        assert_eq!(summary.fetched, 1);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(summary.processed(), 2);
    }

    #[test]
    fn test_concurrent_records_see_distinct_counts() {
        let counters = std::sync::Arc::new(CrawlCounters::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counters = std::sync::Arc::clone(&counters);
                std::thread::spawn(move || {
                    (0..50)
                        .map(|_| counters.record(&FetchOutcome::Failed(FailureKind::Network)))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen: Vec<u64> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();
        seen.sort_unstable();

        assert_eq!(seen, (1..=400).collect::<Vec<u64>>());
        assert_eq!(seen.iter().filter(|n| *n % 10 == 0).count(), 40);
    }

    #[test]
    fn test_link_counts() {
        let counters = CrawlCounters::new();
        counters.add_links(10, 2);
        counters.add_links(5, 0);

        let summary = counters.summary(0, Duration::ZERO, true);
        assert_eq!(summary.links_discovered, 15);
        assert_eq!(summary.links_invalid, 2);
        assert!(summary.stopped);
    }

    #[test]
    fn test_empty_summary() {
        let summary = CrawlSummary::default();
        assert_eq!(summary.processed(), 0);
        assert!(summary.failures_by_kind.is_empty());
    }
}
