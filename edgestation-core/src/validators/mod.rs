//! Range Validators for Weather Readings
//!
//! One validator per measured quantity. Each checks that the value is a
//! finite number inside a plausible band:
//!
//! | Metric      | Band            |
//! |-------------|-----------------|
//! | Temperature | -60 .. 140 °C   |
//! | Humidity    | 0 .. 100 %RH    |
//! | Pressure    | 870 .. 1090 hPa |
//!
//! Bounds are inclusive. A reading is valid only when all three pass; see
//! [`crate::ReadingValidator`].
//!
//! ```rust
//! use edgestation_core::{Validator, TemperatureValidator};
//!
//! let v = TemperatureValidator::default();
//! assert!(v.validate(21.0).is_ok());
//! assert!(v.validate(150.0).is_err());
//! ```

pub mod humidity;
pub mod pressure;
pub mod temperature;
pub mod utils;

pub use humidity::HumidityValidator;
pub use pressure::PressureValidator;
pub use temperature::TemperatureValidator;
