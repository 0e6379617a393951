//! Robots.txt cache records
//!
//! A record is immutable once built; a refresh replaces it wholesale.

use crate::robots::RobotsRules;
use chrono::{DateTime, Duration, Utc};

/// The rules a cached record evaluates against
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleSet {
    /// Rules parsed from a fetched robots.txt
    Parsed(RobotsRules),

    /// The fetch failed; everything is allowed until the record expires
    DefaultAllow,
}

/// Cached robots.txt state for one origin
#[derive(Debug, Clone)]
pub struct RobotsRecord {
    /// Rules in force for the origin
    pub rules: RuleSet,

    /// When the robots.txt was fetched (or the fetch failed)
    pub fetched_at: DateTime<Utc>,

    /// How long the record stays fresh
    pub ttl: Duration,
}

impl RobotsRecord {
    /// Creates a record for successfully fetched rules
    pub fn parsed(rules: RobotsRules, ttl: Duration) -> Self {
        Self {
            rules: RuleSet::Parsed(rules),
            fetched_at: Utc::now(),
            ttl,
        }
    }

    /// Creates a default-allow record after a failed fetch
    pub fn default_allow(ttl: Duration) -> Self {
        Self {
            rules: RuleSet::DefaultAllow,
            fetched_at: Utc::now(),
            ttl,
        }
    }

    /// Checks if the record has outlived its TTL
    pub fn is_stale(&self) -> bool {
        self.age() > self.ttl
    }

    /// Returns the age of the record
    pub fn age(&self) -> Duration {
        Utc::now() - self.fetched_at
    }

    pub fn is_default_allow(&self) -> bool {
        matches!(self.rules, RuleSet::DefaultAllow)
    }

    /// Checks if a URL is allowed according to the cached rules
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        match &self.rules {
            RuleSet::Parsed(rules) => rules.is_allowed(url, user_agent),
            RuleSet::DefaultAllow => true,
        }
    }

    /// Gets the crawl delay in seconds from the cached rules
    pub fn crawl_delay(&self, user_agent: &str) -> Option<f64> {
        match &self.rules {
            RuleSet::Parsed(rules) => rules.crawl_delay(user_agent),
            RuleSet::DefaultAllow => None,
        }
    }
}
