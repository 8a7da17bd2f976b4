//! Temperature Validation
//!
//! Air temperature in degrees Celsius. The accepted band is deliberately
//! wide: it only has to catch a sensor returning nonsense, not judge
//! whether the weather is unusual.

use crate::{
    constants::sensors::{TEMP_PLAUSIBLE_MIN_C, TEMP_PLAUSIBLE_MAX_C},
    errors::ValidationResult,
    reading::Metric,
    traits::{Validator, ValidatorConstraints},
};

use super::utils;

/// Range validator for air temperature
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureValidator {
    min: f32,
    max: f32,
}

impl Default for TemperatureValidator {
    fn default() -> Self {
        Self { min: TEMP_PLAUSIBLE_MIN_C, max: TEMP_PLAUSIBLE_MAX_C }
    }
}

impl TemperatureValidator {
    /// Create validator with custom limits (°C)
    pub fn new_with_limits(min: f32, max: f32) -> Self {
        Self { min, max }
    }
}

impl Validator for TemperatureValidator {
    fn validate(&self, value: f32) -> ValidationResult<()> {
        utils::check_range(Metric::Temperature, value, self.min, self.max)
    }

    fn constraints(&self) -> ValidatorConstraints {
        ValidatorConstraints { min_value: self.min, max_value: self.max }
    }
}
