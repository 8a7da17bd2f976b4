//! Unit Conversion Factors

/// Fahrenheit degrees per Celsius degree.
pub const FAHRENHEIT_PER_CELSIUS: f32 = 1.8;

/// Fahrenheit value of 0 °C.
pub const FAHRENHEIT_OFFSET: f32 = 32.0;

/// Inches of mercury per hectopascal.
///
/// Source: 1 inHg = 33.8639 hPa
pub const INHG_PER_HPA: f32 = 0.029_529_987;
