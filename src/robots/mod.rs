//! Robots.txt handling module
//!
//! This module provides functionality for fetching, parsing, and caching robots.txt files.
//! It respects robots.txt directives when crawling websites.
//!
//! Records are cached per origin. The first check for an origin fetches its
//! robots.txt; concurrent checks for the same origin wait on that fetch instead
//! of issuing their own.

mod cache;
mod parser;

pub use cache::{RobotsRecord, RuleSet};
pub use parser::RobotsRules;

use crate::config::{FetchConfig, RobotsConfig};
use crate::crawler::Transport;
use crate::url::{canonicalize, CanonicalUrl, Origin, SafetyGuard};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

type RecordSlot = Arc<Mutex<Option<Arc<RobotsRecord>>>>;

/// Per-origin robots.txt permission checks with a TTL cache
pub struct RobotsPolicy {
    transport: Arc<dyn Transport>,
    guard: SafetyGuard,
    records: DashMap<Origin, RecordSlot>,
    fetch_timeout: Duration,
    max_redirects: u32,
    ttl: chrono::Duration,
    failure_ttl: chrono::Duration,
}

impl RobotsPolicy {
    /// Creates a policy with an empty cache
    pub fn new(
        transport: Arc<dyn Transport>,
        guard: SafetyGuard,
        robots: &RobotsConfig,
        fetch: &FetchConfig,
    ) -> Self {
        Self {
            transport,
            guard,
            records: DashMap::new(),
            fetch_timeout: robots.fetch_timeout(),
            max_redirects: fetch.max_redirects,
            ttl: seconds(robots.cache_ttl_secs),
            failure_ttl: seconds(robots.failure_ttl_secs),
        }
    }

    /// Checks whether `agent` may fetch `url`
    ///
    /// Only blocks on I/O when the origin has no fresh record.
    pub async fn can_fetch(&self, agent: &str, url: &CanonicalUrl) -> bool {
        let record = self.record_for(&url.origin()).await;
        let allowed = record.is_allowed(url.as_str(), agent);
        if !allowed {
            tracing::debug!("robots.txt disallows {} for {}", url, agent);
        }
        allowed
    }

    /// Returns the Crawl-delay for `agent` on `origin`, if one is declared
    pub async fn crawl_delay(&self, agent: &str, origin: &Origin) -> Option<Duration> {
        let record = self.record_for(origin).await;
        record
            .crawl_delay(agent)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }

    /// Returns the fresh record for `origin`, fetching it if needed
    pub async fn record_for(&self, origin: &Origin) -> Arc<RobotsRecord> {
        let slot = Arc::clone(
            self.records
                .entry(origin.clone())
                .or_insert_with(|| Arc::new(Mutex::new(None)))
                .value(),
        );

        // Holding the slot across the fetch makes late arrivals wait for its result
        let mut current = slot.lock().await;
        if let Some(record) = current.as_ref() {
            if !record.is_stale() {
                return Arc::clone(record);
            }
            tracing::debug!("robots.txt for {} is stale, refreshing", origin);
        }

        let record = Arc::new(self.fetch_record(origin).await);
        *current = Some(Arc::clone(&record));
        record
    }

    /// Number of origins with a cache slot
    pub fn cached_origins(&self) -> usize {
        self.records.len()
    }

    async fn fetch_record(&self, origin: &Origin) -> RobotsRecord {
        let mut url = match origin.robots_url() {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("No robots.txt URL for {}: {}", origin, e);
                return RobotsRecord::default_allow(self.failure_ttl);
            }
        };

        let mut seen = HashSet::new();
        for _ in 0..=self.max_redirects {
            if !seen.insert(url.clone()) || !self.guard.is_safe(&url).await {
                tracing::warn!("Refusing robots.txt hop {} for {}", url, origin);
                return RobotsRecord::default_allow(self.failure_ttl);
            }

            let response = match self.transport.get(url.as_url(), self.fetch_timeout).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!("Failed to fetch robots.txt for {}: {}", origin, e);
                    return RobotsRecord::default_allow(self.failure_ttl);
                }
            };

            if response.is_success() {
                tracing::debug!("Fetched robots.txt for {} ({} bytes)", origin, response.body.len());
                return RobotsRecord::parsed(RobotsRules::from_content(&response.body), self.ttl);
            }

            if !response.is_redirect() {
                tracing::debug!(
                    "robots.txt for {} returned {}, allowing all",
                    origin,
                    response.status
                );
                return RobotsRecord::default_allow(self.failure_ttl);
            }

            url = match response.location().map(|loc| canonicalize(loc, &url)) {
                Some(Ok(next)) => next,
                _ => {
                    tracing::warn!("Unusable robots.txt redirect for {}", origin);
                    return RobotsRecord::default_allow(self.failure_ttl);
                }
            };
        }

        tracing::warn!("Too many robots.txt redirects for {}", origin);
        RobotsRecord::default_allow(self.failure_ttl)
    }
}

fn seconds(secs: u64) -> chrono::Duration {
    let secs = i64::try_from(secs).unwrap_or(i64::MAX).min(i64::MAX / 1000);
    chrono::Duration::seconds(secs)
}
