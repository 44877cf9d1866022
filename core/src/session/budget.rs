//! Reconnect rate limiting

use crate::time::{Duration, Instant};

/// Minimum-interval gate between connection attempts
///
/// No attempt is permitted before `last_attempt_at + interval`. The interval
/// starts at `min_interval`, doubles after every failed attempt up to
/// `max_interval`, and drops back to `min_interval` once a connection is
/// established. It is never shorter than `min_interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReconnectBudget {
    last_attempt_at: Option<Instant>,
    min_interval: Duration,
    max_interval: Duration,
    interval: Duration,
}

impl ReconnectBudget {
    /// Create a budget; `max_interval` below `min_interval` is raised to it
    pub fn new(min_interval: Duration, max_interval: Duration) -> Self {
        let max_interval = if max_interval < min_interval {
            min_interval
        } else {
            max_interval
        };
        Self {
            last_attempt_at: None,
            min_interval,
            max_interval,
            interval: min_interval,
        }
    }

    /// Whether an attempt may start at `now`
    ///
    /// The first attempt is always permitted. A `now` earlier than the last
    /// attempt never is.
    pub fn permits(&self, now: Instant) -> bool {
        match self.last_attempt_at {
            None => true,
            Some(last) => now
                .checked_duration_since(last)
                .is_some_and(|elapsed| elapsed >= self.interval),
        }
    }

    pub fn record_attempt(&mut self, now: Instant) {
        self.last_attempt_at = Some(now);
    }

    /// Back off after a failed attempt
    pub fn record_failure(&mut self) {
        let doubled = Duration::from_ticks(self.interval.ticks().saturating_mul(2));
        self.interval = if doubled > self.max_interval {
            self.max_interval
        } else {
            doubled
        };
    }

    /// Connection established: back to the minimum interval
    pub fn reset(&mut self) {
        self.interval = self.min_interval;
    }

    pub fn last_attempt_at(&self) -> Option<Instant> {
        self.last_attempt_at
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Interval currently enforced between attempts
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Earliest time the next attempt is permitted
    pub fn next_attempt_at(&self) -> Option<Instant> {
        self.last_attempt_at.map(|last| last + self.interval)
    }
}
