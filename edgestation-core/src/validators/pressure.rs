//! Pressure Validation
//!
//! Barometric pressure in hectopascals. Readings below 870 hPa or above
//! 1090 hPa are outside anything observed at the surface and are treated
//! as glitches.

use crate::{
    constants::sensors::{PRESSURE_PLAUSIBLE_MIN_HPA, PRESSURE_PLAUSIBLE_MAX_HPA},
    errors::ValidationResult,
    reading::Metric,
    traits::{Validator, ValidatorConstraints},
};

use super::utils;

/// Range validator for barometric pressure
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressureValidator {
    min: f32,
    max: f32,
}

impl Default for PressureValidator {
    fn default() -> Self {
        Self { min: PRESSURE_PLAUSIBLE_MIN_HPA, max: PRESSURE_PLAUSIBLE_MAX_HPA }
    }
}

impl PressureValidator {
    /// Create validator with custom limits (hPa)
    pub fn new_with_limits(min: f32, max: f32) -> Self {
        Self { min, max }
    }
}

impl Validator for PressureValidator {
    fn validate(&self, value: f32) -> ValidationResult<()> {
        utils::check_range(Metric::Pressure, value, self.min, self.max)
    }

    fn constraints(&self) -> ValidatorConstraints {
        ValidatorConstraints { min_value: self.min, max_value: self.max }
    }
}
