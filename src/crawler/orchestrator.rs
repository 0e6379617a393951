//! Crawl orchestrator - main crawl orchestration logic
//!
//! This module drives one crawl run:
//! - Validating the seed and building per-run state (frontier, caches, limiter)
//! - Running a fixed pool of workers that fetch and expand pages
//! - Dedup of discovered links against the visited set
//! - Handling the stop signal
//! - Producing the run summary

use crate::config::{validate, Config};
use crate::crawler::fetcher::{FetchEngine, FetchOutcome, FetchSettings};
use crate::crawler::frontier::{Frontier, InFlight};
use crate::crawler::limiter::IntervalLimiter;
use crate::crawler::parser::{HtmlLinkExtractor, LinkExtractor};
use crate::crawler::transport::{HttpTransport, Transport};
use crate::output::{CrawlCounters, CrawlSummary};
use crate::robots::RobotsPolicy;
use crate::url::{canonicalize, CanonicalUrl, Origin, Resolver, SafetyGuard, SystemResolver};
use crate::{CrawlError, Result};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Main crawler orchestrator
///
/// Holds the configuration and the collaborators. Every call to [`run`](Self::run)
/// builds fresh per-run state, so runs never share caches or visited sets.
pub struct Orchestrator {
    config: Arc<Config>,
    transport: Arc<dyn Transport>,
    resolver: Arc<dyn Resolver>,
    extractor: Arc<dyn LinkExtractor>,
    stop: CancellationToken,
}

/// State shared by the workers of one run
struct RunContext {
    engine: FetchEngine,
    frontier: Arc<Frontier>,
    counters: CrawlCounters,
    extractor: Arc<dyn LinkExtractor>,
    max_depth: u32,
    /// Set when links must stay on the seed's origin
    home: Option<Origin>,
    stop: CancellationToken,
    started: Instant,
}

impl Orchestrator {
    /// Creates an orchestrator with the production HTTP client, system DNS and HTML extractor
    ///
    /// The configuration is validated first.
    pub fn new(config: Config) -> Result<Self> {
        validate(&config)?;
        let transport = HttpTransport::new(&config.user_agent)?;
        Ok(Self::with_collaborators(
            config,
            Arc::new(transport),
            Arc::new(SystemResolver),
            Arc::new(HtmlLinkExtractor::new()),
        ))
    }

    /// Creates an orchestrator with custom collaborators
    pub fn with_collaborators(
        config: Config,
        transport: Arc<dyn Transport>,
        resolver: Arc<dyn Resolver>,
        extractor: Arc<dyn LinkExtractor>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            transport,
            resolver,
            extractor,
            stop: CancellationToken::new(),
        }
    }

    /// Returns the stop signal
    ///
    /// Cancelling it ends the current run: in-flight fetches finish, nothing new
    /// is popped, and [`run`](Self::run) returns a summary marked as stopped.
    pub fn stop_handle(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Crawls from `seed` until the frontier drains or the stop signal fires
    ///
    /// # Errors
    ///
    /// Only run-fatal conditions are errors: an invalid seed URL, or a worker
    /// pool that died before the run could finish. Per-page failures are
    /// counted in the summary.
    pub async fn run(&self, seed: &str) -> Result<CrawlSummary> {
        let seed_url = CanonicalUrl::parse(seed).map_err(|source| CrawlError::InvalidSeed {
            url: seed.to_string(),
            source,
        })?;

        let context = Arc::new(self.build_context(&seed_url));
        context.frontier.seed(seed_url.clone());

        let workers = self.config.crawler.workers.max(1);
        tracing::info!(
            "Starting crawl from {} with {} workers (max depth {})",
            seed_url,
            workers,
            context.max_depth
        );

        let mut pool = JoinSet::new();
        for id in 0..workers {
            let context = Arc::clone(&context);
            pool.spawn(async move { context.work(id).await });
        }

        let mut crashed = 0u32;
        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                crashed += 1;
                tracing::error!("Crawl worker failed: {}", e);
            }
        }

        if crashed == workers && !context.frontier.phase().is_terminal() {
            return Err(CrawlError::WorkerPool(format!(
                "all {} workers failed before the crawl finished",
                workers
            )));
        }

        let stopped = context.stop.is_cancelled();
        let summary = context.counters.summary(
            context.frontier.visited_len(),
            context.started.elapsed(),
            stopped,
        );

        tracing::info!(
            "Crawl {}: {} fetched, {} forbidden, {} failed, {} visited in {:?}",
            if stopped { "stopped" } else { "completed" },
            summary.fetched,
            summary.forbidden(),
            summary.failed,
            summary.visited,
            summary.elapsed
        );

        Ok(summary)
    }

    fn build_context(&self, seed: &CanonicalUrl) -> RunContext {
        let config = &self.config;
        let guard =
            SafetyGuard::with_resolver(&config.safety.blocked_hosts, Arc::clone(&self.resolver));
        let robots = Arc::new(RobotsPolicy::new(
            Arc::clone(&self.transport),
            guard.clone(),
            &config.robots,
            &config.fetch,
        ));
        let limiter = Arc::new(IntervalLimiter::new(config.crawler.min_interval()));
        let engine = FetchEngine::new(
            Arc::clone(&self.transport),
            guard,
            robots,
            limiter,
            FetchSettings::from_config(config),
        );

        RunContext {
            engine,
            frontier: Arc::new(Frontier::new(config.crawler.max_pages)),
            counters: CrawlCounters::new(),
            extractor: Arc::clone(&self.extractor),
            max_depth: config.crawler.max_depth,
            home: config.crawler.stay_on_origin.then(|| seed.origin()),
            stop: self.stop.child_token(),
            started: Instant::now(),
        }
    }
}

impl RunContext {
    async fn work(&self, id: u32) {
        tracing::trace!("Worker {} started", id);
        while let Some(work) = self.frontier.next(&self.stop).await {
            self.process(work).await;
        }
        tracing::trace!("Worker {} finished", id);
    }

    /// Fetches one entry and expands its links
    async fn process(&self, work: InFlight) {
        tracing::debug!("Processing URL: {} (depth {})", work.url(), work.depth());

        // Redirect targets are claimed in the visited set before they are requested
        let outcome = self
            .engine
            .fetch(work.url(), |next| self.frontier.mark_visited(next.clone()))
            .await;
        let processed = self.counters.record(&outcome);

        match &outcome {
            FetchOutcome::Success { url, body, .. } => {
                self.expand(url, body, work.depth());
            }
            FetchOutcome::Duplicate { url } => {
                tracing::debug!("{} redirected to already visited {}", work.url(), url);
            }
            FetchOutcome::Forbidden(reason) => {
                tracing::debug!("Skipping {}: forbidden ({})", work.url(), reason);
            }
            FetchOutcome::Failed(kind) => {
                tracing::debug!("Giving up on {}: {}", work.url(), kind);
            }
        }

        if processed % 10 == 0 {
            let elapsed = self.started.elapsed();
            let rate = self.counters.fetched() as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
            tracing::info!(
                "Progress: {} pages processed, {} in frontier, {:.2} pages/sec",
                processed,
                self.frontier.queued_len(),
                rate
            );
        }
    }

    /// Canonicalizes the page's links against its final URL and enqueues new ones
    fn expand(&self, page: &CanonicalUrl, body: &str, depth: u32) {
        let links = self.extractor.extract_links(body);
        let discovered = links.len() as u64;
        let mut invalid = 0u64;
        let mut enqueued = 0usize;
        let next_depth = depth + 1;

        for raw in links {
            let url = match canonicalize(&raw, page) {
                Ok(url) => url,
                Err(e) => {
                    tracing::debug!("Dropping link {:?} on {}: {}", raw, page, e);
                    invalid += 1;
                    continue;
                }
            };

            if next_depth > self.max_depth {
                continue;
            }
            if let Some(home) = &self.home {
                if &url.origin() != home {
                    tracing::trace!("Dropping off-origin link {}", url);
                    continue;
                }
            }
            if self.frontier.offer(url, next_depth) {
                enqueued += 1;
            }
        }

        self.counters.add_links(discovered, invalid);
        tracing::trace!("{}: {} links, {} new", page, discovered, enqueued);
    }
}
