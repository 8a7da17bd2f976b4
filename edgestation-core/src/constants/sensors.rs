//! Sensor Plausibility Limits and Acquisition Parameters
//!
//! The node uses a combined temperature/humidity/pressure sensor (BME680
//! class). The limits below are not the sensor's datasheet range but the
//! band outside of which a reading is treated as a measurement glitch.

// ===== TEMPERATURE =====

/// Lowest plausible air temperature (°C).
///
/// Below any recorded outdoor temperature with margin.
pub const TEMP_PLAUSIBLE_MIN_C: f32 = -60.0;

/// Highest plausible air temperature (°C).
pub const TEMP_PLAUSIBLE_MAX_C: f32 = 140.0;

// ===== HUMIDITY =====

/// Minimum relative humidity (%).
///
/// Source: Physics (0% RH = no water vapor)
pub const HUMIDITY_PLAUSIBLE_MIN_PCT: f32 = 0.0;

/// Maximum relative humidity (%).
///
/// Source: Physics (100% RH = saturated)
pub const HUMIDITY_PLAUSIBLE_MAX_PCT: f32 = 100.0;

// ===== PRESSURE =====

/// Lowest plausible station pressure (hPa).
///
/// Roughly the lowest sea-level pressure ever recorded in a typhoon.
pub const PRESSURE_PLAUSIBLE_MIN_HPA: f32 = 870.0;

/// Highest plausible station pressure (hPa).
///
/// Just above the highest recorded sea-level pressure.
pub const PRESSURE_PLAUSIBLE_MAX_HPA: f32 = 1090.0;

// ===== ACQUISITION =====

/// Time to wait after switching the sensor's supply on (milliseconds).
pub const SENSOR_SETTLE_TIME_MS: u64 = 25;

/// Measurement attempts after the throw-away measurement.
pub const SENSOR_MAX_ATTEMPTS: u32 = 10;

/// Default I2C address of the sensor (SDO pulled high).
pub const SENSOR_DEFAULT_I2C_ADDR: u8 = 0x77;
