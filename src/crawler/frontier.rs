//! Crawl frontier
//!
//! The queue of pending entries, the visited set, the in-flight count and the
//! run phase live under one lock, so "frontier empty and nothing in flight" is
//! always evaluated as a single fact. Workers that find the queue empty while
//! others are still fetching park on a [`Notify`] until new work or completion.

use crate::state::CrawlPhase;
use crate::url::CanonicalUrl;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// A URL waiting to be fetched, with its distance from the seed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub url: CanonicalUrl,
    pub depth: u32,
}

#[derive(Debug)]
struct FrontierState {
    queue: VecDeque<FrontierEntry>,
    visited: HashSet<CanonicalUrl>,
    in_flight: usize,
    dispatched: u64,
    max_pages: Option<u64>,
    phase: CrawlPhase,
}

impl FrontierState {
    fn cap_reached(&self) -> bool {
        self.max_pages.is_some_and(|max| self.dispatched >= max)
    }

    fn transition(&mut self, next: CrawlPhase) {
        if self.phase == next {
            return;
        }
        if self.phase.can_transition_to(next) {
            tracing::trace!("Crawl phase {} -> {}", self.phase, next);
            self.phase = next;
        }
    }
}

/// Shared frontier and visited set for one crawl run
#[derive(Debug)]
pub struct Frontier {
    state: Mutex<FrontierState>,
    notify: Notify,
}

/// A popped entry being worked on
///
/// Dropping it marks the work complete, which may let the run finish.
#[derive(Debug)]
pub struct InFlight {
    entry: FrontierEntry,
    frontier: Arc<Frontier>,
}

impl Frontier {
    /// Creates an idle frontier; `max_pages` caps the number of pops
    pub fn new(max_pages: Option<u64>) -> Self {
        Self {
            state: Mutex::new(FrontierState {
                queue: VecDeque::new(),
                visited: HashSet::new(),
                in_flight: 0,
                dispatched: 0,
                max_pages,
                phase: CrawlPhase::Idle,
            }),
            notify: Notify::new(),
        }
    }

    /// Enqueues the seed at depth 0 and starts the run
    pub fn seed(&self, url: CanonicalUrl) -> bool {
        let mut state = self.lock();
        if state.phase != CrawlPhase::Idle {
            return false;
        }
        state.visited.insert(url.clone());
        state.queue.push_back(FrontierEntry { url, depth: 0 });
        state.transition(CrawlPhase::Running);
        drop(state);

        self.notify.notify_waiters();
        true
    }

    /// Enqueues `url` unless it was seen before
    ///
    /// The visited-set insert and the queue push happen under the same lock,
    /// so concurrent offers of one URL enqueue it exactly once. Returns false
    /// for duplicates and once the run is done or the page cap is reached.
    pub fn offer(&self, url: CanonicalUrl, depth: u32) -> bool {
        let mut state = self.lock();
        if state.phase.is_terminal() || state.cap_reached() {
            return false;
        }
        if !state.visited.insert(url.clone()) {
            return false;
        }
        state.queue.push_back(FrontierEntry { url, depth });
        state.transition(CrawlPhase::Running);
        drop(state);

        self.notify.notify_waiters();
        true
    }

    /// Records a URL as visited without enqueueing it
    ///
    /// Used to claim redirect targets before they are requested. Returns true if the URL
    /// was not yet in the visited set.
    pub fn mark_visited(&self, url: CanonicalUrl) -> bool {
        self.lock().visited.insert(url)
    }

    /// Pops the next entry, waiting while other work is still in flight
    ///
    /// Returns `None` once the run is done: the queue is empty (or the page
    /// cap is reached) with nothing in flight, or `stop` was cancelled.
    pub async fn next(self: &Arc<Self>, stop: &CancellationToken) -> Option<InFlight> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before inspecting state so a wakeup between the check and the await is kept
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if stop.is_cancelled() {
                    state.transition(CrawlPhase::Done);
                }
                if state.phase.is_terminal() {
                    drop(state);
                    self.notify.notify_waiters();
                    return None;
                }

                if !state.cap_reached() {
                    if let Some(entry) = state.queue.pop_front() {
                        state.in_flight += 1;
                        state.dispatched += 1;
                        state.transition(CrawlPhase::Running);
                        return Some(InFlight {
                            entry,
                            frontier: Arc::clone(self),
                        });
                    }
                }

                if state.in_flight == 0 {
                    state.transition(CrawlPhase::Done);
                    drop(state);
                    self.notify.notify_waiters();
                    return None;
                }

                state.transition(CrawlPhase::Draining);
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = stop.cancelled() => {}
            }
        }
    }

    pub fn phase(&self) -> CrawlPhase {
        self.lock().phase
    }

    pub fn visited_len(&self) -> usize {
        self.lock().visited.len()
    }

    pub fn queued_len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    /// Number of entries popped so far
    pub fn dispatched(&self) -> u64 {
        self.lock().dispatched
    }

    fn complete(&self) {
        let mut state = self.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        drop(state);
        self.notify.notify_waiters();
    }

    fn lock(&self) -> MutexGuard<'_, FrontierState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl InFlight {
    pub fn entry(&self) -> &FrontierEntry {
        &self.entry
    }

    pub fn url(&self) -> &CanonicalUrl {
        &self.entry.url
    }

    pub fn depth(&self) -> u32 {
        self.entry.depth
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.frontier.complete();
    }
}
