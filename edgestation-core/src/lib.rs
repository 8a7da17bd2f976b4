//! Core duty-cycle logic for EdgeStation
//!
//! Everything in this crate is pure: no I/O, no timers, no allocation.
//! The runtime crate feeds it events and timestamps and acts on what it
//! returns, so every decision the node makes can be tested on a host.
//!
//! Key constraints:
//! - Runs on the node's MCU as well as on the host
//! - Transitions are functions of (state, event), never of ambient flags
//! - Every time value is an absolute monotonic timestamp
//!
//! ```no_run
//! use edgestation_core::{Reading, SleepMode, CycleBudget, CycleSignals, decide_sleep};
//! use core::time::Duration;
//!
//! let reading = Reading::evaluate(22.5, 45.0, 1013.25);
//! assert!(reading.valid);
//!
//! let budget = CycleBudget::new(Duration::from_secs(900), 0, 12_000);
//! let signals = CycleSignals {
//!     link_up: true,
//!     reading_valid: reading.valid,
//!     broker_error: false,
//!     http_error: false,
//!     extended_wake: true,
//! };
//! let decision = decide_sleep(SleepMode::AutomaticLight, &signals, &budget);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

// Optional logging, compiled out when the `log` feature is off
#[cfg(feature = "log")]
macro_rules! log_debug {
    ($($arg:tt)*) => { log::debug!($($arg)*) };
}

#[cfg(not(feature = "log"))]
macro_rules! log_debug {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "log")]
macro_rules! log_warn {
    ($($arg:tt)*) => { log::warn!($($arg)*) };
}

#[cfg(not(feature = "log"))]
macro_rules! log_warn {
    ($($arg:tt)*) => {};
}

pub mod budget;
pub mod confirm;
pub mod constants;
pub mod decision;
pub mod errors;
pub mod link;
pub mod outcome;
pub mod reading;
pub mod time;
pub mod traits;
pub mod units;
pub mod validators;

// Public API
pub use budget::CycleBudget;
pub use confirm::{ConfirmTracker, SessionAction, SessionEvent, SessionPhase};
pub use decision::{decide_sleep, CycleSignals, SleepDecision, SleepMode};
pub use errors::{ValidationError, ValidationResult};
pub use link::{LinkAction, LinkEvent, LinkState, LinkStatus, PhyMode, WakeSchedule};
pub use outcome::PublishOutcome;
pub use reading::{Metric, Reading, ReadingValidator};
pub use time::{Deadline, TimeSource, Timestamp};
pub use traits::{Validatable, Validator};
pub use validators::{HumidityValidator, PressureValidator, TemperatureValidator};

/// Crate version, reported in the startup banner
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
