//! Per-cycle time budget
//!
//! The reporting period is measured from the start of the active phase to
//! the start of the next one. Whatever the active phase does not use is
//! the residual the node sleeps for.

use core::time::Duration;

use crate::time::{Deadline, Timestamp};

/// Time accounting for one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleBudget {
    period: Duration,
    elapsed: Duration,
    reporting_deadline: Deadline,
}

impl CycleBudget {
    /// Budget for a cycle that started at `started_at`, evaluated at `now`
    pub fn new(period: Duration, started_at: Timestamp, now: Timestamp) -> Self {
        Self {
            period,
            elapsed: Duration::from_millis(now.saturating_sub(started_at)),
            reporting_deadline: Deadline::after(started_at, period),
        }
    }

    /// Configured reporting period
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Active time consumed so far
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// When the next active phase should begin
    pub fn reporting_deadline(&self) -> Deadline {
        self.reporting_deadline
    }

    /// Time left to sleep, zero when the active phase used the whole period
    pub fn residual(&self) -> Duration {
        self.period.saturating_sub(self.elapsed)
    }

    /// True when the active phase used the whole period or more
    pub fn is_overrun(&self) -> bool {
        self.elapsed >= self.period
    }
}
