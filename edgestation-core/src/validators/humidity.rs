//! Humidity Validation
//!
//! Relative humidity is a percentage, so anything outside 0-100 % is a
//! sensor error. No allowance is made for drift or supersaturation.

use crate::{
    constants::sensors::{HUMIDITY_PLAUSIBLE_MIN_PCT, HUMIDITY_PLAUSIBLE_MAX_PCT},
    errors::ValidationResult,
    reading::Metric,
    traits::{Validator, ValidatorConstraints},
};

use super::utils;

/// Range validator for relative humidity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HumidityValidator {
    min: f32,
    max: f32,
}

impl Default for HumidityValidator {
    fn default() -> Self {
        Self { min: HUMIDITY_PLAUSIBLE_MIN_PCT, max: HUMIDITY_PLAUSIBLE_MAX_PCT }
    }
}

impl HumidityValidator {
    /// Create validator with custom limits (%RH)
    pub fn new_with_limits(min: f32, max: f32) -> Self {
        Self { min, max }
    }
}

impl Validator for HumidityValidator {
    fn validate(&self, value: f32) -> ValidationResult<()> {
        utils::check_range(Metric::Humidity, value, self.min, self.max)
    }

    fn constraints(&self) -> ValidatorConstraints {
        ValidatorConstraints { min_value: self.min, max_value: self.max }
    }
}
