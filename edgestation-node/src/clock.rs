//! Monotonic cycle clock
//!
//! Millisecond timestamps for `edgestation-core`, backed by tokio's clock so
//! that paused-time tests control it. Converts core deadlines back into
//! tokio instants for `timeout_at`.

use std::time::Duration;

use edgestation_core::{Deadline, TimeSource, Timestamp};
use tokio::time::Instant;

/// Milliseconds since the node was built
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    base: Instant,
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TokioClock {
    /// Clock starting at zero now
    pub fn new() -> Self {
        Self { base: Instant::now() }
    }

    /// Tokio instant for a timestamp
    pub fn instant_at(&self, ts: Timestamp) -> Instant {
        self.base + Duration::from_millis(ts)
    }

    /// Tokio instant for a deadline
    pub fn deadline(&self, deadline: Deadline) -> Instant {
        self.instant_at(deadline.instant())
    }
}

impl TimeSource for TokioClock {
    fn now(&self) -> Timestamp {
        u64::try_from(self.base.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}
