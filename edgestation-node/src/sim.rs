//! Simulated peripherals
//!
//! Host implementations of the [`crate::hal`] traits. The binary uses them
//! to run the full duty cycle without hardware; tests use them to script
//! sensor glitches and link behaviour and to inspect what the node did.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use edgestation_core::{LinkEvent, PhyMode, WakeSchedule};

use crate::config::SimulationConfig;
use crate::hal::{
    Delay, EnvironmentalSensor, LinkEventSender, PowerControl, PowerPin, Radio, RadioError, RawMeasurement,
    SensorError, SensorSettings, SwitchInput,
};
use crate::orchestrator::Peripherals;

/// Conversion time of the simulated sensor at 16× oversampling
const SIM_MEASUREMENT_DURATION: Duration = Duration::from_millis(200);

/// Shared view of the sensor and its supply
#[derive(Debug, Default)]
pub struct SensorProbe {
    powered: AtomicBool,
    power_cycles: AtomicUsize,
    inits: AtomicUsize,
    measurements: AtomicUsize,
    releases: AtomicUsize,
    released_while_powered: AtomicBool,
}

impl SensorProbe {
    /// Supply currently on
    pub fn is_powered(&self) -> bool {
        self.powered.load(Ordering::SeqCst)
    }

    /// Times the supply was switched on
    pub fn power_cycles(&self) -> usize {
        self.power_cycles.load(Ordering::SeqCst)
    }

    /// Times the driver was initialised
    pub fn inits(&self) -> usize {
        self.inits.load(Ordering::SeqCst)
    }

    /// Forced conversions, throw-away included
    pub fn measurements(&self) -> usize {
        self.measurements.load(Ordering::SeqCst)
    }

    /// Times the bus was released
    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    /// Bus was released before the supply went off
    pub fn released_while_powered(&self) -> bool {
        self.released_while_powered.load(Ordering::SeqCst)
    }
}

/// Sensor that replays scripted results, then repeats a steady value
pub struct SimSensor {
    script: VecDeque<Result<RawMeasurement, SensorError>>,
    steady: RawMeasurement,
    missing: bool,
    forces: usize,
    failing_force: Option<usize>,
    probe: Arc<SensorProbe>,
}

impl SimSensor {
    /// Always reports `steady`
    pub fn steady(steady: RawMeasurement, probe: Arc<SensorProbe>) -> Self {
        Self {
            script: VecDeque::new(),
            steady,
            missing: false,
            forces: 0,
            failing_force: None,
            probe,
        }
    }

    /// Reports `script` in order (throw-away measurement first), then `steady`
    pub fn scripted(
        script: impl IntoIterator<Item = Result<RawMeasurement, SensorError>>,
        steady: RawMeasurement,
        probe: Arc<SensorProbe>,
    ) -> Self {
        Self {
            script: script.into_iter().collect(),
            steady,
            missing: false,
            forces: 0,
            failing_force: None,
            probe,
        }
    }

    /// Sensor that never answers on the bus
    pub fn missing(probe: Arc<SensorProbe>) -> Self {
        Self {
            script: VecDeque::new(),
            steady: RawMeasurement { temperature: 0.0, humidity: 0.0, pressure: 0.0 },
            missing: true,
            forces: 0,
            failing_force: None,
            probe,
        }
    }

    /// The `nth` conversion request fails on the bus, throw-away counted as 1
    pub fn fail_force_on(mut self, nth: usize) -> Self {
        self.failing_force = Some(nth);
        self
    }
}

impl EnvironmentalSensor for SimSensor {
    fn init(&mut self, address: u8) -> Result<(), SensorError> {
        if self.missing || !self.probe.is_powered() {
            return Err(SensorError::NotFound(address));
        }
        self.probe.inits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn configure(&mut self, _settings: &SensorSettings) -> Result<(), SensorError> {
        Ok(())
    }

    fn measurement_duration(&self) -> Duration {
        SIM_MEASUREMENT_DURATION
    }

    fn force_measurement(&mut self) -> Result<(), SensorError> {
        if !self.probe.is_powered() {
            return Err(SensorError::Bus("sensor unpowered".to_string()));
        }
        self.forces += 1;
        if self.failing_force == Some(self.forces) {
            return Err(SensorError::Bus("no acknowledge".to_string()));
        }
        self.probe.measurements.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn read(&mut self) -> Result<RawMeasurement, SensorError> {
        self.script.pop_front().unwrap_or(Ok(self.steady))
    }

    fn release(&mut self) {
        if self.probe.is_powered() {
            self.probe.released_while_powered.store(true, Ordering::SeqCst);
        }
        self.probe.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// Sensor supply pin
pub struct SimPowerPin {
    probe: Arc<SensorProbe>,
}

impl SimPowerPin {
    /// Pin reporting into `probe`
    pub fn new(probe: Arc<SensorProbe>) -> Self {
        Self { probe }
    }
}

impl PowerPin for SimPowerPin {
    fn set_high(&mut self) {
        if !self.probe.powered.swap(true, Ordering::SeqCst) {
            self.probe.power_cycles.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn set_low(&mut self) {
        self.probe.powered.store(false, Ordering::SeqCst);
    }
}

/// HTTP enable switch
#[derive(Debug, Default)]
pub struct SimSwitch {
    closed: AtomicBool,
}

impl SimSwitch {
    /// Switch in the given position; closed pulls the input low
    pub fn new(closed: bool) -> Self {
        Self { closed: AtomicBool::new(closed) }
    }

    /// Flip the switch
    pub fn set(&self, closed: bool) {
        self.closed.store(closed, Ordering::SeqCst);
    }
}

impl SwitchInput for SimSwitch {
    fn is_low(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Delay that really blocks the calling thread
#[derive(Debug, Default)]
pub struct ThreadDelay;

impl Delay for ThreadDelay {
    fn delay(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Delay that returns at once and adds up what was asked for
#[derive(Debug, Default, Clone)]
pub struct InstantDelay {
    total: Arc<Mutex<Duration>>,
}

impl InstantDelay {
    /// Sum of all requested delays
    pub fn total(&self) -> Duration {
        self.total.lock().map(|t| *t).unwrap_or_default()
    }
}

impl Delay for InstantDelay {
    fn delay(&mut self, duration: Duration) {
        if let Ok(mut total) = self.total.lock() {
            *total += duration;
        }
    }
}

/// How the simulated access point behaves
#[derive(Debug, Clone, Copy)]
pub struct SimLink {
    /// Access point accepts the association
    pub available: bool,
    /// Time from connect request to address assignment
    pub address_delay: Duration,
    /// Negotiated PHY mode
    pub phy: PhyMode,
    /// Access point accepts the wake schedule
    pub accept_wake_schedule: bool,
}

impl From<&SimulationConfig> for SimLink {
    fn from(config: &SimulationConfig) -> Self {
        Self {
            available: config.link_available,
            address_delay: Duration::from_millis(config.address_delay_ms),
            phy: config.phy_mode(),
            accept_wake_schedule: config.accept_wake_schedule,
        }
    }
}

#[derive(Debug)]
struct RadioShared {
    link: Mutex<SimLink>,
    events: Mutex<Option<LinkEventSender>>,
    started: AtomicBool,
    associated: AtomicBool,
    power_save: AtomicBool,
    starts: AtomicUsize,
    connects: AtomicUsize,
    stops: AtomicUsize,
    wake_requests: AtomicUsize,
}

impl RadioShared {
    fn emit(&self, event: LinkEvent) {
        if let Ok(events) = self.events.lock() {
            if let Some(tx) = events.as_ref() {
                let _ = tx.send(event);
            }
        }
    }

    fn link(&self) -> Option<SimLink> {
        self.link.lock().ok().map(|l| *l)
    }
}

/// Radio talking to a simulated access point
#[derive(Debug, Clone)]
pub struct SimRadio {
    shared: Arc<RadioShared>,
}

impl SimRadio {
    /// Radio for the given access point behaviour
    pub fn new(link: SimLink) -> Self {
        Self {
            shared: Arc::new(RadioShared {
                link: Mutex::new(link),
                events: Mutex::new(None),
                started: AtomicBool::new(false),
                associated: AtomicBool::new(false),
                power_save: AtomicBool::new(false),
                starts: AtomicUsize::new(0),
                connects: AtomicUsize::new(0),
                stops: AtomicUsize::new(0),
                wake_requests: AtomicUsize::new(0),
            }),
        }
    }

    /// Change the access point behaviour for later requests
    pub fn set_link(&self, link: SimLink) {
        if let Ok(mut l) = self.shared.link.lock() {
            *l = link;
        }
    }

    /// Drop the association as if the access point went away
    pub fn drop_link(&self) {
        if self.shared.associated.swap(false, Ordering::SeqCst) {
            self.shared.emit(LinkEvent::Disconnected);
        }
    }

    /// Start requests so far
    pub fn starts(&self) -> usize {
        self.shared.starts.load(Ordering::SeqCst)
    }

    /// Connect requests so far
    pub fn connects(&self) -> usize {
        self.shared.connects.load(Ordering::SeqCst)
    }

    /// Stop requests so far
    pub fn stops(&self) -> usize {
        self.shared.stops.load(Ordering::SeqCst)
    }

    /// Wake schedule requests so far
    pub fn wake_requests(&self) -> usize {
        self.shared.wake_requests.load(Ordering::SeqCst)
    }

    /// Modem power-save currently on
    pub fn power_save(&self) -> bool {
        self.shared.power_save.load(Ordering::SeqCst)
    }
}

impl Radio for SimRadio {
    fn start(&self, events: LinkEventSender) -> Result<(), RadioError> {
        if let Ok(mut slot) = self.shared.events.lock() {
            *slot = Some(events);
        }
        self.shared.started.store(true, Ordering::SeqCst);
        self.shared.starts.fetch_add(1, Ordering::SeqCst);
        self.shared.emit(LinkEvent::Started);
        Ok(())
    }

    fn connect(&self) -> Result<(), RadioError> {
        if !self.shared.started.load(Ordering::SeqCst) {
            return Err(RadioError::NotStarted);
        }
        self.shared.connects.fetch_add(1, Ordering::SeqCst);

        let link = self.shared.link().ok_or_else(|| RadioError::Driver("link lock poisoned".to_string()))?;
        if !link.available {
            return Ok(());
        }

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            tokio::time::sleep(link.address_delay).await;
            if !shared.started.load(Ordering::SeqCst) || shared.associated.swap(true, Ordering::SeqCst) {
                return;
            }
            shared.emit(LinkEvent::Associated);
            shared.emit(LinkEvent::AddressAssigned);
        });
        Ok(())
    }

    fn stop(&self) -> Result<(), RadioError> {
        self.shared.stops.fetch_add(1, Ordering::SeqCst);
        self.shared.started.store(false, Ordering::SeqCst);
        if self.shared.associated.swap(false, Ordering::SeqCst) {
            self.shared.emit(LinkEvent::Disconnected);
        }
        self.shared.emit(LinkEvent::Stopped);
        if let Ok(mut slot) = self.shared.events.lock() {
            *slot = None;
        }
        Ok(())
    }

    fn phy_mode(&self) -> Option<PhyMode> {
        if self.shared.associated.load(Ordering::SeqCst) {
            self.shared.link().map(|l| l.phy)
        } else {
            None
        }
    }

    fn request_wake_schedule(&self, _schedule: &WakeSchedule) -> Result<(), RadioError> {
        if !self.shared.associated.load(Ordering::SeqCst) {
            return Err(RadioError::NotStarted);
        }
        self.shared.wake_requests.fetch_add(1, Ordering::SeqCst);
        let accepted = self.shared.link().map_or(false, |l| l.accept_wake_schedule);
        self.shared.emit(if accepted {
            LinkEvent::WakeScheduleAccepted
        } else {
            LinkEvent::WakeScheduleRejected
        });
        Ok(())
    }

    fn set_power_save(&self, enabled: bool) -> Result<(), RadioError> {
        self.shared.power_save.store(enabled, Ordering::SeqCst);
        Ok(())
    }
}

/// Kind of low-power pause the host was asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepKind {
    /// CPU light sleep
    Light,
    /// Deep sleep
    Deep,
}

/// Power control on a host: every sleep is a tokio sleep
#[derive(Debug, Default)]
pub struct HostPower {
    automatic: AtomicBool,
    sleeps: Mutex<Vec<(SleepKind, Duration)>>,
}

impl HostPower {
    /// Sleeps carried out so far
    pub fn sleeps(&self) -> Vec<(SleepKind, Duration)> {
        self.sleeps.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Automatic light sleep currently enabled
    pub fn automatic_light_sleep(&self) -> bool {
        self.automatic.load(Ordering::SeqCst)
    }

    fn record(&self, kind: SleepKind, duration: Duration) {
        if let Ok(mut sleeps) = self.sleeps.lock() {
            sleeps.push((kind, duration));
        }
    }
}

#[async_trait]
impl PowerControl for HostPower {
    fn set_automatic_light_sleep(&self, enabled: bool) {
        self.automatic.store(enabled, Ordering::SeqCst);
    }

    async fn light_sleep(&self, duration: Duration) {
        self.record(SleepKind::Light, duration);
        tokio::time::sleep(duration).await;
    }

    async fn deep_sleep(&self, duration: Duration) {
        self.record(SleepKind::Deep, duration);
        tokio::time::sleep(duration).await;
    }
}

/// Simulated peripherals as described by the `[simulation]` section
pub fn peripherals(config: &SimulationConfig) -> Peripherals {
    let probe = Arc::new(SensorProbe::default());
    let steady = RawMeasurement {
        temperature: config.temperature,
        humidity: config.humidity,
        pressure: config.pressure,
    };

    Peripherals {
        sensor: Box::new(SimSensor::steady(steady, Arc::clone(&probe))),
        sensor_power: Box::new(SimPowerPin::new(probe)),
        delay: Box::new(ThreadDelay),
        switch: Arc::new(SimSwitch::new(config.switch_on)),
        radio: Arc::new(SimRadio::new(SimLink::from(config))),
        power: Arc::new(HostPower::default()),
    }
}
