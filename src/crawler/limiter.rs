//! Keyed interval limiter
//!
//! Enforces a minimum spacing between actions that share a key (an origin in
//! the crawler). Each key owns an async mutex around its [`OriginState`]; the
//! read-wait-record sequence runs inside that critical section, so callers with
//! the same key serialize while different keys never contend.

use crate::state::OriginState;
use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;

/// Per-key minimum-interval limiter
pub struct IntervalLimiter<K> {
    /// Lazily created per-key state
    slots: DashMap<K, Arc<Mutex<OriginState>>>,

    /// Spacing applied by [`IntervalLimiter::wait`]
    min_interval: Duration,
}

/// Exclusive turn for one key
///
/// While a turn is alive, other callers for the same key wait. The fetch engine
/// holds it for the duration of one request attempt so an origin never sees two
/// overlapping requests.
pub struct OriginTurn {
    state: OwnedMutexGuard<OriginState>,
}

impl<K> IntervalLimiter<K>
where
    K: Eq + Hash + Clone,
{
    /// Creates a limiter with the given minimum spacing
    pub fn new(min_interval: Duration) -> Self {
        Self {
            slots: DashMap::new(),
            min_interval,
        }
    }

    /// Returns the configured minimum spacing
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Waits until `min_interval` has elapsed since the last action for `key`
    ///
    /// The new action time is recorded before returning.
    pub async fn wait(&self, key: &K) {
        drop(self.acquire(key, self.min_interval).await);
    }

    /// Waits for the key's next slot and returns the held turn
    ///
    /// `interval` overrides the default spacing for this call (a robots
    /// crawl-delay, for instance). The wait is measured from the previously
    /// recorded action, not from when this caller arrived.
    pub async fn acquire(&self, key: &K, interval: Duration) -> OriginTurn {
        let slot = self.slot(key);
        let mut state = slot.lock_owned().await;

        if let Some(ready_at) = state.ready_at(interval) {
            tokio::time::sleep_until(ready_at).await;
        }
        state.record_action(Instant::now());

        OriginTurn { state }
    }

    /// Returns a snapshot of the state for `key`, if it was ever used
    pub async fn snapshot(&self, key: &K) -> Option<OriginState> {
        let slot = self.slots.get(key).map(|entry| Arc::clone(entry.value()))?;
        let state = slot.lock().await;
        Some(state.clone())
    }

    /// Number of keys tracked so far
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn slot(&self, key: &K) -> Arc<Mutex<OriginState>> {
        // Clone the Arc out so the DashMap shard lock is not held across awaits
        Arc::clone(
            self.slots
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(OriginState::new())))
                .value(),
        )
    }
}

impl OriginTurn {
    /// Delays the next action on this key by at least `duration` from now
    ///
    /// Used after an HTTP 429 so the retry waits out the remote's cool-down.
    pub fn cool_down(&mut self, duration: Duration) {
        self.state.extend_cooldown(Instant::now(), duration);
    }
}
