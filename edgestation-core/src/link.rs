//! Network link state machine
//!
//! ```text
//!            Started            AddressAssigned
//!   Down ─────────────▶ Connecting ─────────────▶ Up
//!    ▲                    │  ▲                     │
//!    │   WaitExpired      │  │  Disconnected       │
//!    └────────────────────┘  └─────────────────────┘
//! ```
//!
//! The transition function is pure. The runtime owns a single task that
//! feeds driver and control events through [`transition`] and carries out
//! the returned [`LinkAction`]. Nothing else writes the link state.

use core::time::Duration;

/// Connection state of the station link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    /// Radio stopped, or a wait budget expired
    #[default]
    Down,
    /// Association or address assignment in progress
    Connecting,
    /// Address assigned, traffic can flow
    Up,
}

/// Link state plus the flags derived from it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkStatus {
    /// Connection state
    pub state: LinkState,
    /// Extended wake schedule accepted; only ever set while Up
    pub extended_wake: bool,
    /// Radio is being shut down on purpose; disconnects are not healed
    pub sleeping: bool,
}

impl LinkStatus {
    /// True when the link is Up
    pub fn is_up(&self) -> bool {
        self.state == LinkState::Up
    }
}

/// Inputs to the link state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// Radio started
    Started,
    /// Associated with the access point, no address yet
    Associated,
    /// Address assigned
    AddressAssigned,
    /// Association lost
    Disconnected,
    /// Access point accepted the wake schedule
    WakeScheduleAccepted,
    /// Access point rejected the wake schedule, or the PHY cannot use one
    WakeScheduleRejected,
    /// A caller's wait for Up ran out of time
    WaitExpired,
    /// Node is about to stop the radio for light sleep
    SleepRequested,
    /// Node woke from light sleep
    SleepEnded,
    /// Radio stopped
    Stopped,
    /// Beacons from the access point stopped arriving
    BeaconTimeout,
}

/// Side effect requested by a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkAction {
    /// Nothing to do
    None,
    /// Issue a connect request to the radio
    Connect,
    /// Ask the access point for the extended wake schedule
    NegotiateWakeSchedule,
}

/// Apply one event to the link status
pub fn transition(status: LinkStatus, event: LinkEvent) -> (LinkStatus, LinkAction) {
    let mut next = status;
    let action = match event {
        LinkEvent::Started => {
            next.state = LinkState::Connecting;
            next.extended_wake = false;
            LinkAction::Connect
        }
        LinkEvent::Associated => {
            if next.state == LinkState::Down {
                next.state = LinkState::Connecting;
            }
            LinkAction::None
        }
        LinkEvent::AddressAssigned => {
            next.state = LinkState::Up;
            next.extended_wake = false;
            LinkAction::NegotiateWakeSchedule
        }
        LinkEvent::Disconnected => {
            next.extended_wake = false;
            if status.sleeping {
                next.state = LinkState::Down;
                LinkAction::None
            } else {
                next.state = LinkState::Connecting;
                LinkAction::Connect
            }
        }
        LinkEvent::WakeScheduleAccepted => {
            next.extended_wake = status.is_up();
            LinkAction::None
        }
        LinkEvent::WakeScheduleRejected => {
            next.extended_wake = false;
            LinkAction::None
        }
        LinkEvent::WaitExpired => {
            if !status.is_up() {
                next.state = LinkState::Down;
            }
            LinkAction::None
        }
        LinkEvent::SleepRequested => {
            next.sleeping = true;
            LinkAction::None
        }
        LinkEvent::SleepEnded => {
            next.sleeping = false;
            LinkAction::None
        }
        LinkEvent::Stopped => {
            next.state = LinkState::Down;
            next.extended_wake = false;
            LinkAction::None
        }
        LinkEvent::BeaconTimeout => LinkAction::None,
    };
    (next, action)
}

/// Physical-layer mode the link negotiated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhyMode {
    /// 802.11b
    Legacy11b,
    /// 802.11g
    Legacy11g,
    /// 802.11n, 20 MHz
    Ht20,
    /// 802.11n, 40 MHz
    Ht40,
    /// 802.11ax, 20 MHz
    He20,
    /// Vendor low-rate mode
    LowRate,
}

impl PhyMode {
    /// Only HE links can carry a target wake time agreement
    pub fn supports_wake_schedule(&self) -> bool {
        matches!(self, Self::He20)
    }
}

/// Extended wake-interval request sent to the access point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct WakeSchedule {
    /// Wake interval mantissa
    pub mantissa: u16,
    /// Wake interval exponent
    pub exponent: u8,
    /// Minimum awake window, in units of 256 µs
    pub min_wake_duration: u8,
}

impl Default for WakeSchedule {
    fn default() -> Self {
        Self {
            mantissa: 6250,
            exponent: 4,
            min_wake_duration: 255,
        }
    }
}

impl WakeSchedule {
    /// Time between wake windows: mantissa × 2^exponent µs
    pub fn interval(&self) -> Duration {
        let us = u64::from(self.mantissa)
            .checked_shl(u32::from(self.exponent))
            .unwrap_or(u64::MAX);
        Duration::from_micros(us)
    }
}
