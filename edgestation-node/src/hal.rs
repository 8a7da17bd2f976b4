//! Hardware abstraction
//!
//! The duty cycle only touches hardware through these traits. A firmware
//! build implements them on the real drivers; [`crate::sim`] implements
//! them on the host.

use std::time::Duration;

use async_trait::async_trait;
use edgestation_core::{LinkEvent, PhyMode, WakeSchedule};
use thiserror::Error;
use tokio::sync::mpsc;

/// Sender the radio reports link events on
pub type LinkEventSender = mpsc::UnboundedSender<LinkEvent>;

/// Sensor driver errors
#[derive(Debug, Error)]
pub enum SensorError {
    /// Bus transaction failed
    #[error("Bus error: {0}")]
    Bus(String),

    /// No sensor answered at the address
    #[error("Sensor not found at address {0:#04x}")]
    NotFound(u8),

    /// Results read before the conversion finished
    #[error("Measurement not ready")]
    NotReady,
}

/// Radio driver errors
#[derive(Debug, Error)]
pub enum RadioError {
    /// Operation needs a started radio
    #[error("Radio not started")]
    NotStarted,

    /// Driver rejected the request
    #[error("Driver error: {0}")]
    Driver(String),
}

/// Oversampling and filter settings applied before measuring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorSettings {
    /// Oversampling factor for temperature, humidity and pressure
    pub oversampling: u8,
    /// IIR filter size
    pub filter_size: u8,
    /// Gas heater; unused by the station
    pub heater_enabled: bool,
}

impl Default for SensorSettings {
    fn default() -> Self {
        Self {
            oversampling: 16,
            filter_size: 127,
            heater_enabled: false,
        }
    }
}

/// One raw conversion result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawMeasurement {
    /// °C
    pub temperature: f32,
    /// %RH
    pub humidity: f32,
    /// hPa
    pub pressure: f32,
}

/// Combined temperature, humidity and pressure sensor
pub trait EnvironmentalSensor: Send {
    /// Probe the sensor at `address`
    fn init(&mut self, address: u8) -> Result<(), SensorError>;

    /// Apply oversampling and filter settings
    fn configure(&mut self, settings: &SensorSettings) -> Result<(), SensorError>;

    /// Time a forced conversion takes with the current settings
    fn measurement_duration(&self) -> Duration;

    /// Start one conversion
    fn force_measurement(&mut self) -> Result<(), SensorError>;

    /// Read the last conversion
    fn read(&mut self) -> Result<RawMeasurement, SensorError>;

    /// Release the bus
    fn release(&mut self);
}

/// Output pin switching a supply rail
pub trait PowerPin: Send {
    /// Supply on
    fn set_high(&mut self);

    /// Supply off
    fn set_low(&mut self);
}

/// Digital input with pull-up
pub trait SwitchInput: Send + Sync {
    /// True when the input is pulled to ground
    fn is_low(&self) -> bool;
}

/// Blocking delay used inside sensor acquisition
pub trait Delay: Send {
    /// Block for `duration`
    fn delay(&mut self, duration: Duration);
}

/// Station radio
///
/// Requests return as soon as the driver accepted them; progress is
/// reported as [`LinkEvent`]s on the sender given to [`Radio::start`].
pub trait Radio: Send + Sync {
    /// Start the radio; emits [`LinkEvent::Started`]
    fn start(&self, events: LinkEventSender) -> Result<(), RadioError>;

    /// Associate with the configured access point
    fn connect(&self) -> Result<(), RadioError>;

    /// Stop the radio; emits `Disconnected` if associated, then `Stopped`
    fn stop(&self) -> Result<(), RadioError>;

    /// PHY mode of the current association
    fn phy_mode(&self) -> Option<PhyMode>;

    /// Ask the access point for a wake schedule; the answer arrives as an event
    fn request_wake_schedule(&self, schedule: &WakeSchedule) -> Result<(), RadioError>;

    /// Modem power-save between beacons
    fn set_power_save(&self, enabled: bool) -> Result<(), RadioError>;
}

/// CPU power states
#[async_trait]
pub trait PowerControl: Send + Sync {
    /// Let the idle task enter light sleep on its own
    fn set_automatic_light_sleep(&self, enabled: bool);

    /// Light sleep for `duration`; memory and peripherals are kept
    async fn light_sleep(&self, duration: Duration);

    /// Deep sleep with a timer wake-up after `duration`
    ///
    /// Returns when the timer fires. Nothing in memory is meant to survive
    /// it; the caller rebuilds the node.
    async fn deep_sleep(&self, duration: Duration);
}
