//! Broker delivery confirmation
//!
//! A broker session is complete once the broker has acknowledged every
//! metric. Completion is counted from acknowledgement events only; a
//! publish call returning is not proof of delivery. The count belongs to
//! one session and starts from zero on every attempt.
//!
//! A packet id is counted once, so a repeated acknowledgement cannot stand
//! in for a missing one. Id 0 never names a QoS 1/2 packet; it marks a
//! QoS 0 write, and each of those counts.

use crate::reading::Metric;

/// Most acknowledgements one session waits for
const CAPACITY: usize = Metric::ALL.len();

/// Counts distinct delivery acknowledgements for one session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmTracker {
    expected: u8,
    confirmed: u8,
    seen: [Option<u16>; CAPACITY],
}

impl Default for ConfirmTracker {
    fn default() -> Self {
        Self::new(Metric::ALL.len() as u8)
    }
}

impl ConfirmTracker {
    /// Tracker that completes after `expected` acknowledgements, at most three
    pub const fn new(expected: u8) -> Self {
        let expected = if expected as usize > CAPACITY { CAPACITY as u8 } else { expected };
        Self {
            expected,
            confirmed: 0,
            seen: [None; CAPACITY],
        }
    }

    /// Record the acknowledgement of `message_id`, returns true when complete
    pub fn record(&mut self, message_id: u16) -> bool {
        if self.is_complete() {
            return true;
        }
        if message_id != 0 && self.seen.contains(&Some(message_id)) {
            log_debug!("duplicate acknowledgement for message {}", message_id);
            return false;
        }
        self.seen[self.confirmed as usize] = Some(message_id);
        self.confirmed += 1;
        self.is_complete()
    }

    /// All expected acknowledgements received
    pub fn is_complete(&self) -> bool {
        self.confirmed >= self.expected
    }

    /// Acknowledgements so far
    pub fn confirmed(&self) -> u8 {
        self.confirmed
    }

    /// Start counting again for a new session
    pub fn reset(&mut self) {
        self.confirmed = 0;
        self.seen = [None; CAPACITY];
    }
}

/// Broker session events, as seen by the publish channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Session established
    Connected,
    /// Broker acknowledged a message
    Published {
        /// Packet id of the acknowledged message
        message_id: u16,
    },
    /// Session closed by the broker or the link
    Disconnected,
    /// Transport or protocol failure
    Error,
}

/// What the publish channel should do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    /// Keep waiting
    None,
    /// Publish the three metrics
    PublishReadings,
    /// Close the session
    Teardown,
}

/// Lifecycle of one broker session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// Waiting for the broker to accept the session
    #[default]
    Connecting,
    /// Metrics sent, waiting for acknowledgements
    Publishing,
    /// Every metric acknowledged
    Confirmed,
    /// Session lost before confirmation
    Failed,
}

impl SessionPhase {
    /// Apply an event, counting acknowledgements in `tracker`
    pub fn on_event(self, event: SessionEvent, tracker: &mut ConfirmTracker) -> (SessionPhase, SessionAction) {
        match (self, event) {
            (Self::Confirmed | Self::Failed, _) => (self, SessionAction::None),
            (Self::Connecting, SessionEvent::Connected) => {
                tracker.reset();
                (Self::Publishing, SessionAction::PublishReadings)
            }
            (Self::Publishing, SessionEvent::Connected) => (self, SessionAction::None),
            (Self::Publishing, SessionEvent::Published { message_id }) => {
                log_debug!("broker acknowledged message {}", message_id);
                if tracker.record(message_id) {
                    (Self::Confirmed, SessionAction::Teardown)
                } else {
                    (self, SessionAction::None)
                }
            }
            (Self::Connecting, SessionEvent::Published { .. }) => (self, SessionAction::None),
            (_, SessionEvent::Disconnected | SessionEvent::Error) => (Self::Failed, SessionAction::Teardown),
        }
    }

    /// Terminal phases end the attempt
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed)
    }
}
