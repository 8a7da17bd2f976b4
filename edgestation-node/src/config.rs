//! Station configuration loading and validation.
//!
//! Configuration is read once at startup from a TOML file and stays
//! immutable afterwards. Every section has defaults matching a deployed
//! station, so a file only needs the site-specific values (broker
//! credentials, station id, API key).
//!
//! Parsing failures are reported by [`StationConfig::load`]. Semantic
//! checks live in [`StationConfig::validate`], which the duty cycle runs
//! in its `Validate` state so that a bad file leads to the same bounded
//! wait and restart as any other cycle-fatal error.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use edgestation_connectors::{HttpConfig, MqttConfig};
use edgestation_core::{
    constants::{sensors, time},
    PhyMode, SleepMode, WakeSchedule,
};
use serde::{Deserialize, Serialize};

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "EDGESTATION_CONFIG";

/// Configuration file used when the environment variable is unset
pub const DEFAULT_CONFIG_PATH: &str = "/etc/edgestation/config.toml";

/// Errors that can occur during configuration loading or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Generic configuration-related error with a descriptive message.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error while accessing configuration files.
    #[error("IO error while reading configuration: {0}")]
    IoError(#[from] std::io::Error),

    /// Failure to parse the TOML configuration file.
    #[error("Parse error while reading configuration: {0}")]
    ParseError(String),

    /// Reporting period of zero or less.
    #[error("Reporting period must be positive, got {0} minutes")]
    NonPositivePeriod(i64),

    /// Reporting period above one day.
    #[error("Reporting period of {0} minutes exceeds the {max} minute limit", max = time::MAX_REPORTING_PERIOD_MIN)]
    PeriodTooLong(i64),

    /// Broker URL that cannot be connected to.
    #[error("Invalid broker URL: {0}")]
    BrokerUrl(String),

    /// Weather endpoint that cannot be requested.
    #[error("Invalid weather endpoint: {0}")]
    WeatherEndpoint(String),

    /// Sleep mode this node cannot carry out.
    #[error("Sleep mode {0} is not supported")]
    UnsupportedSleepMode(SleepMode),

    /// Sleep mode incompatible with the scheduler's tick configuration.
    #[error("Sleep mode {mode} cannot be used with tickless_idle = {tickless_idle}")]
    TicklessMismatch { mode: SleepMode, tickless_idle: bool },

    /// A timeout of zero seconds.
    #[error("Timeout {0} must be at least one second")]
    ZeroTimeout(&'static str),
}

/// Top-level station configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    /// Minutes between the starts of consecutive cycles.
    pub reporting_period_min: i64,

    /// Preferred low-power strategy between cycles.
    pub sleep_mode: SleepMode,

    /// Whether the scheduler runs without a periodic tick.
    ///
    /// Automatic light sleep needs it; manual light sleep must not have it.
    pub tickless_idle: bool,

    /// Start acquisition at cycle entry, overlapping link bring-up.
    pub overlap_acquisition: bool,

    /// Timeouts and delays.
    pub timeouts: TimeoutConfig,

    /// Broker channel.
    pub broker: MqttConfig,

    /// HTTP weather channel.
    pub weather: WeatherConfig,

    /// Sensor wiring and acquisition.
    pub sensor: SensorConfig,

    /// GPIO of the switch that enables HTTP publishing (active low).
    pub switch_pin: u8,

    /// Extended wake schedule requested from the access point.
    pub wake_schedule: WakeSchedule,

    /// Logging subsystem configuration.
    pub logger: LoggerConfig,

    /// Host simulation of the peripherals.
    pub simulation: SimulationConfig,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            reporting_period_min: time::DEFAULT_REPORTING_PERIOD_MIN as i64,
            sleep_mode: SleepMode::Deep,
            tickless_idle: false,
            overlap_acquisition: false,
            timeouts: TimeoutConfig::default(),
            broker: MqttConfig::default(),
            weather: WeatherConfig::default(),
            sensor: SensorConfig::default(),
            switch_pin: 12,
            wake_schedule: WakeSchedule::default(),
            logger: LoggerConfig::default(),
            simulation: SimulationConfig::default(),
        }
    }
}

/// Timeouts in seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Full link bring-up.
    pub connect_secs: u64,
    /// Re-association after light sleep.
    pub fast_reconnect_secs: u64,
    /// Broker channel, shared by all session attempts.
    pub mqtt_secs: u64,
    /// HTTP channel.
    pub http_secs: u64,
    /// Wait before restarting after a cycle-fatal error.
    pub restart_delay_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: time::DEFAULT_CONNECT_TIMEOUT_S,
            fast_reconnect_secs: time::DEFAULT_FAST_RECONNECT_TIMEOUT_S,
            mqtt_secs: time::DEFAULT_PUBLISH_TIMEOUT_S,
            http_secs: time::DEFAULT_PUBLISH_TIMEOUT_S,
            restart_delay_secs: time::DEFAULT_RESTART_DELAY_S,
        }
    }
}

impl TimeoutConfig {
    /// Full bring-up budget
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    /// Fast reconnect budget
    pub fn fast_reconnect(&self) -> Duration {
        Duration::from_secs(self.fast_reconnect_secs)
    }

    /// Broker channel budget
    pub fn mqtt(&self) -> Duration {
        Duration::from_secs(self.mqtt_secs)
    }

    /// HTTP channel budget
    pub fn http(&self) -> Duration {
        Duration::from_secs(self.http_secs)
    }

    /// Delay before a fallback restart
    pub fn restart_delay(&self) -> Duration {
        Duration::from_secs(self.restart_delay_secs)
    }
}

/// HTTP weather endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WeatherConfig {
    /// Update endpoint URL.
    pub endpoint: String,
    /// Station identifier.
    pub station_id: String,
    /// Station API key.
    pub api_key: String,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            endpoint: edgestation_connectors::http::DEFAULT_ENDPOINT.to_string(),
            station_id: String::new(),
            api_key: String::new(),
        }
    }
}

/// Sensor wiring and acquisition settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SensorConfig {
    /// I2C address.
    pub i2c_address: u8,
    /// I2C controller number.
    pub i2c_port: u8,
    /// SDA GPIO.
    pub sda_pin: u8,
    /// SCL GPIO.
    pub scl_pin: u8,
    /// GPIO switching the sensor's supply.
    pub power_pin: u8,
    /// Wait after power-on, milliseconds.
    pub settle_time_ms: u64,
    /// Measurement attempts after the throw-away measurement.
    pub max_attempts: u32,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            i2c_address: sensors::SENSOR_DEFAULT_I2C_ADDR,
            i2c_port: 0,
            sda_pin: 21,
            scl_pin: 22,
            power_pin: 20,
            settle_time_ms: sensors::SENSOR_SETTLE_TIME_MS,
            max_attempts: sensors::SENSOR_MAX_ATTEMPTS,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggerConfig {
    /// Filter directives: trace, debug, info, warn, error or per-module.
    pub level: String,
    /// Tag printed on every line.
    pub tag: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            tag: "Weather Station".to_string(),
        }
    }
}

/// Behaviour of the simulated peripherals used on a host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    /// Reported temperature, °C.
    pub temperature: f32,
    /// Reported relative humidity, %.
    pub humidity: f32,
    /// Reported pressure, hPa.
    pub pressure: f32,
    /// Whether the simulated access point accepts the association.
    pub link_available: bool,
    /// Time from connect request to address assignment, milliseconds.
    pub address_delay_ms: u64,
    /// Whether the link negotiates an HE PHY that can carry a wake schedule.
    pub he_phy: bool,
    /// Whether the access point accepts the wake schedule.
    pub accept_wake_schedule: bool,
    /// Position of the HTTP enable switch.
    pub switch_on: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            temperature: 21.0,
            humidity: 50.0,
            pressure: 1013.25,
            link_available: true,
            address_delay_ms: 1200,
            he_phy: true,
            accept_wake_schedule: true,
            switch_on: true,
        }
    }
}

impl SimulationConfig {
    /// PHY mode the simulated link negotiates
    pub fn phy_mode(&self) -> PhyMode {
        if self.he_phy {
            PhyMode::He20
        } else {
            PhyMode::Ht20
        }
    }
}

impl StationConfig {
    /// Locates and loads the configuration file.
    ///
    /// Returns the configuration together with the path it came from.
    pub fn new() -> Result<(Self, PathBuf), ConfigError> {
        let path = Self::get_config_path()?;
        let config = Self::load(&path)?;
        Ok((config, path))
    }

    /// Determines the configuration file path.
    ///
    /// Priority:
    /// 1. `EDGESTATION_CONFIG` environment variable
    /// 2. `/etc/edgestation/config.toml`
    fn get_config_path() -> Result<PathBuf, ConfigError> {
        if let Ok(config_path) = std::env::var(CONFIG_ENV) {
            return Ok(PathBuf::from(config_path));
        }

        let fallback = Path::new(DEFAULT_CONFIG_PATH);
        if fallback.exists() {
            return Ok(fallback.to_path_buf());
        }

        Err(ConfigError::Config("No configuration file found.".to_string()))
    }

    /// Loads configuration from the specified path.
    ///
    /// Only syntax and types are checked here; see [`Self::validate`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::Config(format!(
                "{} does not exist",
                path.to_string_lossy()
            )));
        }

        let config_str = fs::read_to_string(path)?;
        Self::from_toml(&config_str)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Rejects settings the duty cycle cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reporting_period_min <= 0 {
            return Err(ConfigError::NonPositivePeriod(self.reporting_period_min));
        }
        if self.reporting_period_min as u64 > time::MAX_REPORTING_PERIOD_MIN {
            return Err(ConfigError::PeriodTooLong(self.reporting_period_min));
        }

        match self.sleep_mode {
            SleepMode::ExternalTimer => {
                return Err(ConfigError::UnsupportedSleepMode(self.sleep_mode));
            }
            SleepMode::AutomaticLight if !self.tickless_idle => {
                return Err(ConfigError::TicklessMismatch {
                    mode: self.sleep_mode,
                    tickless_idle: self.tickless_idle,
                });
            }
            SleepMode::ManualLight if self.tickless_idle => {
                return Err(ConfigError::TicklessMismatch {
                    mode: self.sleep_mode,
                    tickless_idle: self.tickless_idle,
                });
            }
            _ => {}
        }

        let timeouts = [
            ("connect_secs", self.timeouts.connect_secs),
            ("fast_reconnect_secs", self.timeouts.fast_reconnect_secs),
            ("mqtt_secs", self.timeouts.mqtt_secs),
            ("http_secs", self.timeouts.http_secs),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, secs)| *secs == 0) {
            return Err(ConfigError::ZeroTimeout(*name));
        }

        self.broker
            .endpoint()
            .map_err(|e| ConfigError::BrokerUrl(e.to_string()))?;
        HttpConfig::new(self.weather.endpoint.as_str())
            .validate()
            .map_err(|e| ConfigError::WeatherEndpoint(e.to_string()))?;

        Ok(())
    }

    /// Reporting period; zero when the configured value is not positive
    ///
    /// Saturates for periods [`Self::validate`] rejects as too long.
    pub fn reporting_period(&self) -> Duration {
        let minutes = u64::try_from(self.reporting_period_min).unwrap_or(0);
        Duration::from_secs(minutes.saturating_mul(time::SECONDS_PER_MINUTE))
    }
}
