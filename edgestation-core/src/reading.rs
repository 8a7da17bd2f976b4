//! Weather Readings
//!
//! A [`Reading`] is the one measurement a cycle produces. It is only
//! forwarded to the publish channels when [`Reading::valid`] is set, which
//! happens only if every metric passes its range validator.

use core::fmt;

use crate::{
    errors::ValidationResult,
    traits::Validator,
    validators::{HumidityValidator, PressureValidator, TemperatureValidator},
};

/// The quantities the station measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Metric {
    /// Air temperature, °C
    Temperature,
    /// Relative humidity, %
    Humidity,
    /// Barometric pressure, hPa
    Pressure,
}

impl Metric {
    /// All metrics, in publish order
    pub const ALL: [Metric; 3] = [Metric::Temperature, Metric::Humidity, Metric::Pressure];

    /// Lowercase name, also used as the broker topic suffix
    pub const fn as_str(&self) -> &'static str {
        match self {
            Metric::Temperature => "temperature",
            Metric::Humidity => "humidity",
            Metric::Pressure => "pressure",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One measurement of all three metrics
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Reading {
    /// Air temperature, °C
    pub temperature: f32,
    /// Relative humidity, %
    pub humidity: f32,
    /// Barometric pressure, hPa
    pub pressure: f32,
    /// Set only when every metric passed validation
    pub valid: bool,
}

impl Default for Reading {
    fn default() -> Self {
        Self::invalid()
    }
}

impl Reading {
    /// A reading that never passed validation
    pub const fn invalid() -> Self {
        Self {
            temperature: 0.0,
            humidity: 0.0,
            pressure: 0.0,
            valid: false,
        }
    }

    /// Build a reading and mark it valid if all metrics are plausible
    pub fn evaluate(temperature: f32, humidity: f32, pressure: f32) -> Self {
        let valid = ReadingValidator::default()
            .check(temperature, humidity, pressure)
            .is_ok();
        Self { temperature, humidity, pressure, valid }
    }

    /// Value of a single metric
    pub fn value(&self, metric: Metric) -> f32 {
        match metric {
            Metric::Temperature => self.temperature,
            Metric::Humidity => self.humidity,
            Metric::Pressure => self.pressure,
        }
    }
}

/// Validates all three metrics of a reading
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadingValidator {
    /// Temperature range check
    pub temperature: TemperatureValidator,
    /// Humidity range check
    pub humidity: HumidityValidator,
    /// Pressure range check
    pub pressure: PressureValidator,
}

impl ReadingValidator {
    /// Check the three values, reporting the first that fails
    pub fn check(&self, temperature: f32, humidity: f32, pressure: f32) -> ValidationResult<()> {
        self.temperature.validate(temperature)?;
        self.humidity.validate(humidity)?;
        self.pressure.validate(pressure)?;
        Ok(())
    }

    /// Build a [`Reading`] using these validators
    pub fn evaluate(&self, temperature: f32, humidity: f32, pressure: f32) -> Reading {
        let result = self.check(temperature, humidity, pressure);
        if let Err(e) = &result {
            log_debug!("reading rejected: {}", e);
        }
        Reading {
            temperature,
            humidity,
            pressure,
            valid: result.is_ok(),
        }
    }
}
