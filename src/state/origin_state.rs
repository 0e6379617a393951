use std::time::Duration;
use tokio::time::Instant;

/// Tracks the pacing state of one origin during crawling
///
/// This structure holds the per-key bookkeeping the interval limiter needs:
/// when the last permitted action happened and any remote-imposed cool-down.
#[derive(Debug, Clone, Default)]
pub struct OriginState {
    /// When the last permitted action for this key was released
    pub last_action: Option<Instant>,

    /// Earliest instant the next action may start after a cool-down (HTTP 429)
    pub cooldown_until: Option<Instant>,

    /// Number of actions permitted for this key
    pub actions: u32,

    /// Number of cool-downs applied to this key
    pub cooldowns: u32,
}

impl OriginState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the earliest instant the next action may start
    ///
    /// That is the later of `last_action + interval` and any active cool-down.
    /// `None` means the action may start immediately.
    pub fn ready_at(&self, interval: Duration) -> Option<Instant> {
        let spaced = self.last_action.map(|last| later(last, interval));
        match (spaced, self.cooldown_until) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }

    /// Records a permitted action at `now`
    pub fn record_action(&mut self, now: Instant) {
        self.last_action = Some(now);
        self.actions += 1;
    }

    /// Extends the cool-down so no action starts before `now + duration`
    pub fn extend_cooldown(&mut self, now: Instant, duration: Duration) {
        let until = later(now, duration);
        self.cooldown_until = Some(self.cooldown_until.map_or(until, |c| c.max(until)));
        self.cooldowns += 1;
    }
}

/// `at + delay`, saturating at a far-future instant instead of overflowing
fn later(at: Instant, delay: Duration) -> Instant {
    at.checked_add(delay)
        .unwrap_or_else(|| Instant::now() + Duration::from_secs(FAR_FUTURE_SECS))
}

/// Roughly 30 years
const FAR_FUTURE_SECS: u64 = 86_400 * 365 * 30;
