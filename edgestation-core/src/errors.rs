//! Error Types for Reading Validation
//!
//! ## Design Philosophy
//!
//! A failed range check on this node is a sensor glitch, not a fault: the
//! acquisition loop simply takes another measurement. Errors are therefore
//! kept small and `Copy` so they can be produced on every attempt without
//! allocation, and carry just enough context for a diagnostic line.
//!
//! ## Error Categories
//!
//! - `OutOfRange`: Value outside the plausible band for the metric
//!   (e.g., 1200 hPa barometric pressure)
//! - `InvalidValue`: Mathematically invalid (NaN, infinity), typically a
//!   driver returning an uninitialised result register
//!
//! ## Error Handling Strategy
//!
//! ```rust
//! use edgestation_core::{ValidationError, Validator, PressureValidator};
//!
//! let validator = PressureValidator::default();
//! match validator.validate(1200.0) {
//!     Ok(()) => {}
//!     Err(ValidationError::OutOfRange { .. }) => {
//!         // Glitch - measure again
//!     }
//!     Err(ValidationError::InvalidValue(_)) => {
//!         // Driver returned garbage - measure again
//!     }
//! }
//! ```

use thiserror_no_std::Error;

use crate::reading::Metric;

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validation errors - kept small for embedded use
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum ValidationError {
    /// Value outside the plausible range
    #[error("{metric} value {value} outside range [{min}, {max}]")]
    OutOfRange {
        /// Which measurement failed
        metric: Metric,
        /// The actual sensor reading that failed validation
        value: f32,
        /// Minimum acceptable value
        min: f32,
        /// Maximum acceptable value
        max: f32,
    },

    /// Value makes no physical sense (NaN, infinity)
    #[error("Invalid {0} value: not a valid number")]
    InvalidValue(Metric),
}

impl ValidationError {
    /// The metric that failed
    pub fn metric(&self) -> Metric {
        match self {
            Self::OutOfRange { metric, .. } => *metric,
            Self::InvalidValue(metric) => *metric,
        }
    }
}
