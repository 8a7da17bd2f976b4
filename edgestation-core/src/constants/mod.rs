//! Constants for EdgeStation Core
//!
//! Centralised numeric values used throughout the duty cycle. Defaults match
//! the field-deployed station settings; all of them can be overridden from
//! the node configuration.
//!
//! ## Organization
//!
//! - **Sensors**: Plausibility limits and acquisition parameters
//! - **Time**: Unit conversions, timeouts and delays
//! - **Units**: Conversion factors for the weather endpoint

/// Sensor plausibility limits and acquisition parameters.
pub mod sensors;

/// Time-related constants for intervals, timeouts, and delays.
pub mod time;

/// Conversion factors between metric and imperial weather units.
pub mod units;

pub use sensors::{
    TEMP_PLAUSIBLE_MIN_C, TEMP_PLAUSIBLE_MAX_C,
    HUMIDITY_PLAUSIBLE_MIN_PCT, HUMIDITY_PLAUSIBLE_MAX_PCT,
    PRESSURE_PLAUSIBLE_MIN_HPA, PRESSURE_PLAUSIBLE_MAX_HPA,
};

pub use time::SECONDS_PER_MINUTE;
