//! Unit conversions for the weather endpoint
//!
//! The broker gets metric values as measured; the weather endpoint wants
//! °F and inches of mercury.

use crate::constants::units::{FAHRENHEIT_OFFSET, FAHRENHEIT_PER_CELSIUS, INHG_PER_HPA};

/// °C to °F
#[inline]
pub fn celsius_to_fahrenheit(celsius: f32) -> f32 {
    celsius * FAHRENHEIT_PER_CELSIUS + FAHRENHEIT_OFFSET
}

/// hPa to inHg
#[inline]
pub fn hpa_to_inhg(hpa: f32) -> f32 {
    hpa * INHG_PER_HPA
}
