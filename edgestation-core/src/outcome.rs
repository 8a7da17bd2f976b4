//! Per-channel publish outcome
//!
//! Each publish channel owns exactly one of these and hands it back by
//! value when it finishes.

use crate::time::{Deadline, Timestamp};

/// Result of one publish channel for one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishOutcome {
    /// A request was actually sent
    pub attempted: bool,
    /// The channel finished, successfully or not
    pub completed: bool,
    /// The channel failed or missed its deadline
    pub error: bool,
    /// When the channel started
    pub started_at: Timestamp,
    /// When the channel must have finished
    pub deadline: Deadline,
}

impl PublishOutcome {
    /// Channel began work at `now`
    pub fn started(now: Timestamp, deadline: Deadline) -> Self {
        Self {
            attempted: true,
            completed: false,
            error: false,
            started_at: now,
            deadline,
        }
    }

    /// Channel chose not to send anything; counts as a clean completion
    pub fn skipped(now: Timestamp) -> Self {
        Self {
            attempted: false,
            completed: true,
            error: false,
            started_at: now,
            deadline: Deadline::at(now),
        }
    }

    /// Mark successful completion
    pub fn complete(mut self) -> Self {
        self.completed = true;
        self.error = false;
        self
    }

    /// Mark failure
    pub fn fail(mut self) -> Self {
        self.completed = true;
        self.error = true;
        self
    }

    /// Outcome for a channel that never reported back before its deadline
    pub fn overdue(started_at: Timestamp, deadline: Deadline) -> Self {
        Self::started(started_at, deadline).fail()
    }

    /// Finished without error
    pub fn succeeded(&self) -> bool {
        self.completed && !self.error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skipped_is_clean() {
        let o = PublishOutcome::skipped(100);
        assert_eq!((o.attempted, o.completed, o.error), (false, true, false));
        assert!(o.succeeded());
    }

    #[test]
    fn started_then_failed() {
        let o = PublishOutcome::started(0, Deadline::at(30_000));
        assert!(o.attempted && !o.completed);
        let o = o.fail();
        assert!(o.completed && o.error);
        assert!(!o.succeeded());
    }

    #[test]
    fn overdue_is_an_error() {
        let o = PublishOutcome::overdue(5, Deadline::at(10));
        assert!(o.attempted && o.error);
        assert_eq!(o.deadline.instant(), 10);
    }
}
