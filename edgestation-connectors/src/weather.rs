//! Weather-endpoint payload
//!
//! PWS-style aggregators take a reading as query parameters in imperial
//! units. Field precision is fixed: one decimal for °F and %RH, two for
//! inHg.

use core::fmt;

use edgestation_core::{units, Reading};

/// Software tag reported to the endpoint
pub const SOFTWARE_TYPE: &str = "ESP32DIY";

/// One `updateraw` submission
#[derive(Clone, PartialEq)]
pub struct WeatherUpdate {
    /// Station identifier
    pub station_id: String,
    /// Station API key
    pub api_key: String,
    /// Air temperature, °F
    pub tempf: f32,
    /// Relative humidity, %
    pub humidity: f32,
    /// Barometric pressure, inHg
    pub baromin: f32,
}

impl WeatherUpdate {
    /// Convert a metric reading for submission
    pub fn from_reading(reading: &Reading, station_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            station_id: station_id.into(),
            api_key: api_key.into(),
            tempf: units::celsius_to_fahrenheit(reading.temperature),
            humidity: reading.humidity,
            baromin: units::hpa_to_inhg(reading.pressure),
        }
    }

    /// Query parameters in the order the endpoint documents them
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("ID", self.station_id.clone()),
            ("PASSWORD", self.api_key.clone()),
            ("dateutc", "now".to_string()),
            ("tempf", format!("{:.1}", self.tempf)),
            ("humidity", format!("{:.1}", self.humidity)),
            ("baromin", format!("{:.2}", self.baromin)),
            ("softwaretype", SOFTWARE_TYPE.to_string()),
            ("action", "updateraw".to_string()),
        ]
    }

    /// Query string without the leading `?`
    pub fn to_query_string(&self) -> String {
        self.query_pairs()
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }
}

// Keeps the API key out of logs
impl fmt::Debug for WeatherUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeatherUpdate")
            .field("station_id", &self.station_id)
            .field("tempf", &self.tempf)
            .field("humidity", &self.humidity)
            .field("baromin", &self.baromin)
            .finish_non_exhaustive()
    }
}
