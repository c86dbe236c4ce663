//! Time budget and cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Limits for a single solve call.
#[derive(Debug, Clone)]
pub struct SolveLimits {
    /// Wall-clock budget.
    pub time_limit: Duration,
    /// External stop request. Raising it ends the search at the next poll.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for SolveLimits {
    fn default() -> Self {
        Self {
            time_limit: Duration::from_secs(10),
            cancel: None,
        }
    }
}

impl SolveLimits {
    /// Limits with the given budget and no cancel flag.
    pub fn new(time_limit: Duration) -> Self {
        Self {
            time_limit,
            cancel: None,
        }
    }

    /// Limits with a budget in milliseconds.
    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    /// Attaches a cancellation flag.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Starts the clock.
    pub fn deadline(&self) -> Deadline {
        let start = Instant::now();
        Deadline {
            start,
            end: start.checked_add(self.time_limit),
            cancel: self.cancel.clone(),
        }
    }
}

/// A running budget derived from [`SolveLimits`].
#[derive(Debug, Clone)]
pub struct Deadline {
    start: Instant,
    end: Option<Instant>,
    cancel: Option<Arc<AtomicBool>>,
}

impl Deadline {
    /// Whether the cancel flag has been raised.
    pub fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Whether the budget has elapsed.
    pub fn timed_out(&self) -> bool {
        self.end.is_some_and(|end| Instant::now() >= end)
    }

    /// Whether the search must stop: budget elapsed or cancelled.
    pub fn expired(&self) -> bool {
        self.cancelled() || self.timed_out()
    }

    /// Time since the clock started.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Time left in the budget (zero once elapsed).
    pub fn remaining(&self) -> Duration {
        match self.end {
            Some(end) => end.saturating_duration_since(Instant::now()),
            None => Duration::MAX,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = SolveLimits::default();
        assert_eq!(limits.time_limit, Duration::from_secs(10));
        assert!(limits.cancel.is_none());
    }

    #[test]
    fn test_zero_budget_expires() {
        let deadline = SolveLimits::new(Duration::ZERO).deadline();
        assert!(deadline.expired());
        assert!(deadline.timed_out());
        assert!(!deadline.cancelled());
        assert_eq!(deadline.remaining(), Duration::ZERO);
    }

    #[test]
    fn test_cancel_flag() {
        let flag = Arc::new(AtomicBool::new(false));
        let deadline = SolveLimits::from_millis(60_000)
            .with_cancel_flag(flag.clone())
            .deadline();
        assert!(!deadline.expired());
        flag.store(true, Ordering::Relaxed);
        assert!(deadline.expired());
        assert!(deadline.cancelled());
        assert!(!deadline.timed_out());
    }

    #[test]
    fn test_huge_budget_does_not_overflow() {
        let deadline = SolveLimits::new(Duration::MAX).deadline();
        assert!(!deadline.expired());
    }
}
