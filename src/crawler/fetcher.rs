//! Fetch engine
//!
//! This module performs one safe, policy-checked, rate-limited, retried GET:
//! - SafetyGuard check on every hop (the seed URL and each redirect target)
//! - robots.txt check on every hop
//! - per-origin spacing through the interval limiter
//! - exponential backoff with jitter for retryable failures
//! - manual redirect handling with loop and length bounds

use crate::config::Config;
use crate::crawler::limiter::IntervalLimiter;
use crate::crawler::transport::{RawResponse, Transport, TransportError};
use crate::robots::RobotsPolicy;
use crate::url::{canonicalize, CanonicalUrl, Origin, SafetyGuard};
use crate::UrlError;
use rand::Rng;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound on delays dictated by the remote side (Retry-After, Crawl-delay)
pub const MAX_REMOTE_DELAY: Duration = Duration::from_secs(120);

/// Why a URL was refused without being requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForbiddenReason {
    /// robots.txt disallows the URL for our agent
    Robots,
    /// The safety guard rejected the URL or a redirect target
    Unsafe,
}

/// Why a fetch failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Retryable failures persisted through every attempt
    Exhausted,
    /// Non-retryable HTTP status (4xx other than 429, unexpected 3xx)
    HttpStatus(u16),
    /// The host name did not resolve
    Dns,
    /// The response could not be used (bad body, redirect without target)
    Malformed,
    /// Other non-retryable network failure
    Network,
    /// Redirect chain looped or exceeded the hop bound
    RedirectBound,
}

/// Result of one fetch attempt sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A 2xx response; `url` is the final URL after redirects
    Success {
        url: CanonicalUrl,
        status: u16,
        body: String,
    },
    Forbidden(ForbiddenReason),
    Failed(FailureKind),
    /// A redirect led to a URL this run already claimed; nothing was sent for it
    Duplicate { url: CanonicalUrl },
}

impl fmt::Display for ForbiddenReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Robots => write!(f, "robots"),
            Self::Unsafe => write!(f, "unsafe"),
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted => write!(f, "exhausted"),
            Self::HttpStatus(status) => write!(f, "http-{}", status),
            Self::Dns => write!(f, "dns"),
            Self::Malformed => write!(f, "malformed"),
            Self::Network => write!(f, "network"),
            Self::RedirectBound => write!(f, "redirect-bound"),
        }
    }
}

/// Tunables for the fetch engine
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// robots.txt product token
    pub agent: String,
    pub request_timeout: Duration,
    pub max_redirects: u32,
    /// Total attempts for retryable failures, including the first
    pub max_attempts: u32,
    pub backoff_base: Duration,
    /// Cool-down after HTTP 429 when no Retry-After is given
    pub rate_limit_cooldown: Duration,
    pub respect_crawl_delay: bool,
}

impl FetchSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            agent: config.user_agent.robots_token().to_string(),
            request_timeout: config.fetch.request_timeout(),
            max_redirects: config.fetch.max_redirects,
            max_attempts: config.fetch.max_attempts.max(1),
            backoff_base: config.fetch.backoff_base(),
            rate_limit_cooldown: config.fetch.rate_limit_cooldown(),
            respect_crawl_delay: config.fetch.respect_crawl_delay,
        }
    }
}

/// Composes the safety guard, robots policy and interval limiter around the transport
pub struct FetchEngine {
    transport: Arc<dyn Transport>,
    guard: SafetyGuard,
    robots: Arc<RobotsPolicy>,
    limiter: Arc<IntervalLimiter<Origin>>,
    settings: FetchSettings,
}

impl FetchEngine {
    pub fn new(
        transport: Arc<dyn Transport>,
        guard: SafetyGuard,
        robots: Arc<RobotsPolicy>,
        limiter: Arc<IntervalLimiter<Origin>>,
        settings: FetchSettings,
    ) -> Self {
        Self {
            transport,
            guard,
            robots,
            limiter,
            settings,
        }
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    /// Fetches `url`, following redirects
    ///
    /// # Request Flow
    ///
    /// For the URL and then every redirect target:
    /// 1. SafetyGuard check → `Forbidden(Unsafe)`, nothing sent
    /// 2. robots.txt check → `Forbidden(Robots)`, nothing sent
    /// 3. Wait for the origin's turn, send the GET (retried per the table below)
    /// 4. 2xx → `Success`; redirect → next hop; anything else → `Failed`
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | Timeout, connect failure, connection reset | Retry with backoff |
    /// | HTTP 5xx | Retry with backoff |
    /// | HTTP 429 | Cool down the origin, then retry with backoff |
    /// | Other 4xx | Immediate → `Failed(HttpStatus)` |
    /// | DNS failure | Immediate → `Failed(Dns)` |
    /// | Malformed response | Immediate → `Failed(Malformed)` |
    /// | Redirect loop or chain too long | Immediate → `Failed(RedirectBound)` |
    ///
    /// After the last attempt, retryable failures give `Failed(Exhausted)`.
    ///
    /// `admit_hop` is asked about every redirect target before it is
    /// requested. Returning false ends the fetch with `Duplicate`, which keeps
    /// a redirect from re-fetching a URL the caller already handled.
    pub async fn fetch<F>(&self, url: &CanonicalUrl, admit_hop: F) -> FetchOutcome
    where
        F: Fn(&CanonicalUrl) -> bool,
    {
        let mut current = url.clone();
        let mut chain = HashSet::from([current.clone()]);
        let mut hops = 0u32;

        loop {
            if !self.guard.is_safe(&current).await {
                return FetchOutcome::Forbidden(ForbiddenReason::Unsafe);
            }

            if !self.robots.can_fetch(&self.settings.agent, &current).await {
                return FetchOutcome::Forbidden(ForbiddenReason::Robots);
            }

            let response = match self.get_with_retry(&current).await {
                Ok(response) => response,
                Err(kind) => return FetchOutcome::Failed(kind),
            };

            if response.is_success() {
                return FetchOutcome::Success {
                    url: current,
                    status: response.status,
                    body: response.body,
                };
            }

            if !response.is_redirect() {
                tracing::debug!("{} returned HTTP {}", current, response.status);
                return FetchOutcome::Failed(FailureKind::HttpStatus(response.status));
            }

            let next = match next_hop(&response, &current) {
                Ok(next) => next,
                Err(outcome) => return outcome,
            };

            if hops >= self.settings.max_redirects {
                tracing::debug!("Redirect chain from {} exceeds {} hops", url, hops);
                return FetchOutcome::Failed(FailureKind::RedirectBound);
            }
            if !chain.insert(next.clone()) {
                tracing::debug!("Redirect loop at {} (from {})", next, url);
                return FetchOutcome::Failed(FailureKind::RedirectBound);
            }
            if !admit_hop(&next) {
                tracing::debug!("Redirect from {} to already visited {}", current, next);
                return FetchOutcome::Duplicate { url: next };
            }

            tracing::trace!("Following redirect {} -> {}", current, next);
            hops += 1;
            current = next;
        }
    }

    /// Issues the GET for one hop, retrying retryable failures
    async fn get_with_retry(&self, url: &CanonicalUrl) -> Result<RawResponse, FailureKind> {
        let origin = url.origin();
        let spacing = self.spacing_for(&origin).await;
        let attempts = self.settings.max_attempts.max(1);

        for attempt in 1..=attempts {
            let result = {
                // The turn is held for the whole request: one active request per origin
                let mut turn = self.limiter.acquire(&origin, spacing).await;
                let result = self
                    .transport
                    .get(url.as_url(), self.settings.request_timeout)
                    .await;

                if let Ok(response) = &result {
                    if response.status == 429 {
                        let cooldown = self.cooldown_for(response);
                        tracing::warn!(
                            "{} rate limited us (HTTP 429), cooling down for {:?}",
                            origin,
                            cooldown
                        );
                        turn.cool_down(cooldown);
                    }
                }
                result
            };

            let reason = match result {
                Ok(response) if is_retryable_status(response.status) => {
                    format!("HTTP {}", response.status)
                }
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() => e.to_string(),
                Err(TransportError::Dns(msg)) => {
                    tracing::debug!("DNS failure for {}: {}", url, msg);
                    return Err(FailureKind::Dns);
                }
                Err(TransportError::Malformed(msg)) => {
                    tracing::debug!("Malformed response from {}: {}", url, msg);
                    return Err(FailureKind::Malformed);
                }
                Err(e) => {
                    tracing::debug!("Request to {} failed: {}", url, e);
                    return Err(FailureKind::Network);
                }
            };

            if attempt == attempts {
                tracing::warn!("Giving up on {} after {} attempts: {}", url, attempts, reason);
                break;
            }

            let delay = backoff_delay(self.settings.backoff_base, attempt);
            tracing::warn!(
                "Attempt {}/{} for {} failed ({}), retrying in {:?}",
                attempt,
                attempts,
                url,
                reason,
                delay
            );
            tokio::time::sleep(delay).await;
        }

        Err(FailureKind::Exhausted)
    }

    /// Spacing for an origin: the minimum interval, raised to the robots Crawl-delay
    async fn spacing_for(&self, origin: &Origin) -> Duration {
        let min_interval = self.limiter.min_interval();
        if !self.settings.respect_crawl_delay {
            return min_interval;
        }

        match self.robots.crawl_delay(&self.settings.agent, origin).await {
            Some(delay) => delay.min(MAX_REMOTE_DELAY).max(min_interval),
            None => min_interval,
        }
    }

    fn cooldown_for(&self, response: &RawResponse) -> Duration {
        response
            .retry_after()
            .map(|d| d.min(MAX_REMOTE_DELAY))
            .unwrap_or(self.settings.rate_limit_cooldown)
    }
}

/// Resolves the redirect target of `response`
fn next_hop(response: &RawResponse, current: &CanonicalUrl) -> Result<CanonicalUrl, FetchOutcome> {
    let Some(location) = response.location() else {
        tracing::debug!("Redirect from {} without Location", current);
        return Err(FetchOutcome::Failed(FailureKind::Malformed));
    };

    match canonicalize(location, current) {
        Ok(next) => Ok(next),
        Err(UrlError::InvalidScheme(_)) => {
            tracing::debug!("Redirect from {} to non-HTTP target {}", current, location);
            Err(FetchOutcome::Forbidden(ForbiddenReason::Unsafe))
        }
        Err(e) => {
            tracing::debug!("Unusable redirect from {} to {}: {}", current, location, e);
            Err(FetchOutcome::Failed(FailureKind::Malformed))
        }
    }
}

fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

/// Backoff before retry number `attempt` (1-based): `base * 2^(attempt-1)` plus up to 25% jitter
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    let delay = base.saturating_mul(1u32 << exponent);

    let jitter_ceiling = (delay.as_millis() / 4) as u64;
    let jitter = if jitter_ceiling == 0 {
        0
    } else {
        rand::thread_rng().gen_range(0..=jitter_ceiling)
    };

    delay + Duration::from_millis(jitter)
}
