//! Common Validation Utilities
//!
//! Shared checks used by every metric validator so that NaN handling and
//! bound inclusivity are identical for temperature, humidity and pressure.
//!
//! All functions are pure and allocation-free.
//!
//! ```rust
//! use edgestation_core::Metric;
//! use edgestation_core::validators::utils::check_range;
//!
//! assert!(check_range(Metric::Humidity, 55.0, 0.0, 100.0).is_ok());
//! assert!(check_range(Metric::Humidity, 101.0, 0.0, 100.0).is_err());
//! ```

use crate::{
    errors::{ValidationError, ValidationResult},
    reading::Metric,
    traits::Validatable,
};

/// Check that `value` is a finite number inside `[min, max]`
///
/// Bounds are inclusive. Non-finite values are reported as
/// [`ValidationError::InvalidValue`] rather than out of range.
#[inline]
pub fn check_range(metric: Metric, value: f32, min: f32, max: f32) -> ValidationResult<()> {
    if !value.is_valid() {
        return Err(ValidationError::InvalidValue(metric));
    }

    if value < min || value > max {
        return Err(ValidationError::OutOfRange { metric, value, min, max });
    }

    Ok(())
}
