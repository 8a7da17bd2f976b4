//! Core traits for validators
//!
//! These traits define the interface all metric validators implement.
//! Keep them simple - the node validates three numbers per cycle.

use crate::errors::ValidationResult;

/// Core validator trait - implement this for each measured quantity
pub trait Validator {
    /// Validate a single reading
    fn validate(&self, value: f32) -> ValidationResult<()>;

    /// Get the accepted range for this validator
    fn constraints(&self) -> ValidatorConstraints;
}

/// Accepted range for a validator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidatorConstraints {
    /// Minimum valid value (inclusive)
    pub min_value: f32,

    /// Maximum valid value (inclusive)
    pub max_value: f32,
}

impl ValidatorConstraints {
    /// Check whether `value` lies inside the range, bounds included
    pub fn contains(&self, value: f32) -> bool {
        value >= self.min_value && value <= self.max_value
    }
}

/// Trait for values that can be validated
pub trait Validatable {
    /// Check if the value is a usable number (not NaN, infinite)
    fn is_valid(&self) -> bool;
}

impl Validatable for f32 {
    fn is_valid(&self) -> bool {
        self.is_finite()
    }
}
