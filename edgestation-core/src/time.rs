//! Time management for the duty cycle
//!
//! All scheduling uses one monotonic clock:
//! - Timestamps are milliseconds since boot
//! - Deadlines are absolute timestamps, never relative countdowns
//! - Remaining time saturates at zero, it never goes negative

use core::time::Duration;

/// Timestamp in milliseconds since device boot
pub type Timestamp = u64;

/// Source of time for the system
pub trait TimeSource {
    /// Get current timestamp in milliseconds
    fn now(&self) -> Timestamp;
}

/// An absolute point in time by which something must have finished
///
/// Several operations can share one deadline: the broker channel's
/// connection attempts all draw from the same one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline {
    at: Timestamp,
}

impl Deadline {
    /// Deadline at an absolute timestamp
    pub const fn at(at: Timestamp) -> Self {
        Self { at }
    }

    /// Deadline `budget` after `now`
    pub fn after(now: Timestamp, budget: Duration) -> Self {
        let ms = u64::try_from(budget.as_millis()).unwrap_or(u64::MAX);
        Self { at: now.saturating_add(ms) }
    }

    /// The absolute timestamp
    pub const fn instant(&self) -> Timestamp {
        self.at
    }

    /// True once `now` has reached the deadline
    pub fn expired(&self, now: Timestamp) -> bool {
        now >= self.at
    }

    /// Time left before the deadline, zero once expired
    pub fn remaining(&self, now: Timestamp) -> Duration {
        Duration::from_millis(self.at.saturating_sub(now))
    }
}
