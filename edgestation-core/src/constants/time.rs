//! Time-Related Constants
//!
//! This module defines time intervals, durations, and conversion factors
//! used by the duty cycle.

// ===== TIME UNIT CONVERSIONS =====

/// Seconds per minute.
pub const SECONDS_PER_MINUTE: u64 = 60;

// ===== DUTY CYCLE DEFAULTS =====

/// Default reporting period (minutes).
pub const DEFAULT_REPORTING_PERIOD_MIN: u64 = 15;

/// Longest accepted reporting period (minutes), one day.
pub const MAX_REPORTING_PERIOD_MIN: u64 = 24 * 60;

/// Default budget for a full link bring-up (seconds).
pub const DEFAULT_CONNECT_TIMEOUT_S: u64 = 30;

/// Default budget for re-associating a link kept through light sleep (seconds).
pub const DEFAULT_FAST_RECONNECT_TIMEOUT_S: u64 = 10;

/// Default budget for each publish channel (seconds).
pub const DEFAULT_PUBLISH_TIMEOUT_S: u64 = 30;

/// Delay before restarting after a cycle-fatal or configuration error (seconds).
pub const DEFAULT_RESTART_DELAY_S: u64 = 120;

/// Stagger between starting the HTTP channel and the broker channel (milliseconds).
///
/// Spreads the radio's transmit current peaks; has no effect on correctness.
pub const PUBLISH_STAGGER_MS: u64 = 50;

/// Pause after tearing down a failed broker session before retrying (milliseconds).
pub const SESSION_RETRY_PAUSE_MS: u64 = 20;

/// Bound on waiting for the link to report Down before manual light sleep (milliseconds).
pub const RADIO_STOP_TIMEOUT_MS: u64 = 5000;
