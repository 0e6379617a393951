/// Lifecycle states of a crawl run
use std::fmt;

/// Represents the current phase of a crawl run
///
/// Runs move `Idle -> Running -> Draining -> Done`. Draining may return to
/// Running when an in-flight fetch enqueues new work, and a stop signal moves
/// any non-terminal phase straight to Done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CrawlPhase {
    /// Run created, seed not yet enqueued
    #[default]
    Idle,

    /// Workers are popping entries from a non-empty frontier
    Running,

    /// Frontier observed empty; waiting for in-flight fetches to settle
    Draining,

    /// Frontier empty with no in-flight work, or the run was stopped
    Done,
}

impl CrawlPhase {
    /// Returns true if moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: CrawlPhase) -> bool {
        use CrawlPhase::*;
        matches!(
            (self, next),
            (Idle, Running)
                | (Idle, Done)
                | (Running, Draining)
                | (Running, Done)
                | (Draining, Running)
                | (Draining, Done)
        )
    }

    /// Returns true once the run can do no more work
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
