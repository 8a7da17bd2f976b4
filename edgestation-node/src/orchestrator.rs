//! Duty-cycle orchestrator
//!
//! Sequences one cycle through
//! `Validate → ConnectLink → Acquire → Publish → DecideSleep → Sleeping`.
//! A cycle-fatal error in the first three states skips straight to a deep
//! sleep of the configured restart delay, after which the node is rebuilt.
//! Channel errors during `Publish` do not abort; they only steer the sleep
//! decision towards deep sleep.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use edgestation_connectors::{
    BrokerClient, ConnectionStats, ConnectorError, HttpConfig, MqttBroker, PwsWeatherClient, WeatherEndpoint,
};
use edgestation_core::{
    decide_sleep, CycleBudget, CycleSignals, Deadline, PublishOutcome, Reading, SleepDecision, TimeSource, Timestamp,
};
use log::{debug, error, info, warn};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::clock::TokioClock;
use crate::config::{ConfigError, StationConfig};
use crate::hal::{Delay, EnvironmentalSensor, PowerControl, PowerPin, Radio, SwitchInput};
use crate::network::{NetworkError, NetworkLifecycle};
use crate::publish::{BrokerChannel, PublishCoordinator, WeatherChannel};
use crate::sensor::{AcquisitionPlan, SensorAcquisition};
use crate::sleep::{format_duration, SleepScheduler, Wake};

/// States of one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    /// Configuration checks
    Validate,
    /// Link bring-up or fast reconnect
    ConnectLink,
    /// Sensor acquisition
    Acquire,
    /// Both publish channels
    Publish,
    /// Sleep strategy selection
    DecideSleep,
    /// Executing the sleep decision
    Sleeping,
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validate => "Validate",
            Self::ConnectLink => "ConnectLink",
            Self::Acquire => "Acquire",
            Self::Publish => "Publish",
            Self::DecideSleep => "DecideSleep",
            Self::Sleeping => "Sleeping",
        };
        f.write_str(name)
    }
}

/// Errors that end a cycle early
#[derive(Debug, Error)]
pub enum CycleError {
    /// Configuration cannot be run
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Link did not come up
    #[error(transparent)]
    Link(#[from] NetworkError),

    /// Sensor gave no valid reading
    #[error("No valid reading")]
    InvalidReading,
}

impl CycleError {
    /// State the cycle was aborted in
    pub fn state(&self) -> CycleState {
        match self {
            Self::Config(_) => CycleState::Validate,
            Self::Link(_) => CycleState::ConnectLink,
            Self::InvalidReading => CycleState::Acquire,
        }
    }
}

/// Hardware the node runs on
pub struct Peripherals {
    /// Environmental sensor
    pub sensor: Box<dyn EnvironmentalSensor>,
    /// Sensor supply switch
    pub sensor_power: Box<dyn PowerPin>,
    /// Blocking delay for sensor timing
    pub delay: Box<dyn Delay>,
    /// HTTP enable switch
    pub switch: Arc<dyn SwitchInput>,
    /// Station radio
    pub radio: Arc<dyn Radio>,
    /// CPU power states
    pub power: Arc<dyn PowerControl>,
}

/// Publish channel clients
pub struct Channels {
    /// Message broker
    pub broker: Arc<dyn BrokerClient>,
    /// Weather aggregation endpoint
    pub weather: Arc<dyn WeatherEndpoint>,
}

impl Channels {
    /// MQTT and HTTP clients as configured
    ///
    /// The broker keep-alive is stretched past the reporting period.
    pub fn from_config(config: &StationConfig) -> Result<Self, ConnectorError> {
        let broker = MqttBroker::new(config.broker.clone().keep_alive_for(config.reporting_period()))?;
        let http = HttpConfig::new(config.weather.endpoint.as_str()).timeout_secs(config.timeouts.http_secs);
        let weather = PwsWeatherClient::new(http)?;

        Ok(Self {
            broker: Arc::new(broker),
            weather: Arc::new(weather),
        })
    }
}

/// What happened in one cycle
#[derive(Debug, Clone, Copy)]
pub struct CycleReport {
    /// Cycle number since the node was built, starting at 1
    pub number: u32,
    /// State a cycle-fatal error occurred in
    pub aborted: Option<CycleState>,
    /// Sensor reading; invalid when acquisition did not run or failed
    pub reading: Reading,
    /// Inputs to the sleep decision
    pub signals: CycleSignals,
    /// Sleep decision
    pub decision: SleepDecision,
    /// Broker channel outcome, if publishing ran
    pub broker: Option<PublishOutcome>,
    /// HTTP channel outcome, if publishing ran
    pub http: Option<PublishOutcome>,
    /// Time from cycle start to decision
    pub elapsed: Duration,
    /// When the decision was made
    pub decided_at: Instant,
}

impl CycleReport {
    fn new(number: u32) -> Self {
        Self {
            number,
            aborted: None,
            reading: Reading::invalid(),
            signals: CycleSignals::default(),
            decision: SleepDecision::RestartNow,
            broker: None,
            http: None,
            elapsed: Duration::ZERO,
            decided_at: Instant::now(),
        }
    }
}

/// The weather station
pub struct Node {
    config: StationConfig,
    clock: TokioClock,
    network: NetworkLifecycle,
    acquisition: Arc<Mutex<SensorAcquisition>>,
    publisher: PublishCoordinator,
    scheduler: SleepScheduler,
    cycles: u32,
}

impl Node {
    /// Assemble a node; must be called inside a tokio runtime
    pub fn new(config: StationConfig, peripherals: Peripherals, channels: Channels) -> Self {
        let clock = TokioClock::new();
        let network = NetworkLifecycle::new(peripherals.radio, config.wake_schedule);
        let acquisition = SensorAcquisition::new(
            peripherals.sensor,
            peripherals.sensor_power,
            peripherals.delay,
            AcquisitionPlan::from(&config.sensor),
        );
        let weather = WeatherChannel::new(
            channels.weather,
            peripherals.switch,
            config.weather.station_id.as_str(),
            config.weather.api_key.as_str(),
            clock,
        );
        let publisher = PublishCoordinator::new(BrokerChannel::new(channels.broker, clock), weather, clock);

        Self {
            config,
            clock,
            network,
            acquisition: Arc::new(Mutex::new(acquisition)),
            publisher,
            scheduler: SleepScheduler::new(peripherals.power),
            cycles: 0,
        }
    }

    /// Run cycles until one ends in a deep sleep or restart
    pub async fn run(&mut self) -> CycleReport {
        loop {
            let report = self.run_cycle().await;
            if self.sleep(&report).await == Wake::Reboot {
                return report;
            }
        }
    }

    /// Run one cycle up to and including the sleep decision
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.cycles += 1;
        let started_at = self.clock.now();
        let mut report = CycleReport::new(self.cycles);
        info!("Cycle {} started", self.cycles);

        let result = self.work(started_at, &mut report).await;

        let status = self.network.status();
        report.signals = CycleSignals {
            link_up: status.is_up(),
            reading_valid: report.reading.valid,
            broker_error: report.broker.map_or(false, |o| o.error),
            http_error: report.http.map_or(false, |o| o.error),
            extended_wake: status.extended_wake,
        };

        report.decision = match result {
            Ok(()) => {
                self.enter(CycleState::DecideSleep);
                let budget = CycleBudget::new(self.config.reporting_period(), started_at, self.clock.now());
                decide_sleep(self.config.sleep_mode, &report.signals, &budget)
            }
            Err(e) => {
                let state = e.state();
                report.aborted = Some(state);
                let delay = self.config.timeouts.restart_delay();
                error!("Cycle {} aborted in {}: {}", self.cycles, state, e);
                warn!("Restarting in {}", format_duration(delay));
                SleepDecision::Deep(delay)
            }
        };

        report.elapsed = Duration::from_millis(self.clock.now().saturating_sub(started_at));
        report.decided_at = Instant::now();
        if self.cycles == 1 {
            info!("Initial startup took {} ms", report.elapsed.as_millis());
        } else {
            info!("Cycle processing took {} ms", report.elapsed.as_millis());
        }
        let stats = self.broker_stats();
        debug!(
            "Broker totals: {} sessions, {} sent, {} failed",
            stats.sessions, stats.messages_sent, stats.messages_failed
        );
        report
    }

    /// Carry out the decision of `report`
    pub async fn sleep(&self, report: &CycleReport) -> Wake {
        self.enter(CycleState::Sleeping);
        self.scheduler.execute(report.decision, report.decided_at, &self.network).await
    }

    /// Cycles run so far
    pub fn cycles(&self) -> u32 {
        self.cycles
    }

    /// Broker client totals across cycles
    pub fn broker_stats(&self) -> ConnectionStats {
        self.publisher.broker_stats()
    }

    fn enter(&self, state: CycleState) {
        debug!("Cycle {}: {}", self.cycles, state);
    }

    async fn work(&mut self, started_at: Timestamp, report: &mut CycleReport) -> Result<(), CycleError> {
        self.enter(CycleState::Validate);
        self.config.validate()?;

        let early = self
            .config
            .overlap_acquisition
            .then(|| SensorAcquisition::spawn(&self.acquisition));

        self.enter(CycleState::ConnectLink);
        self.connect_link(started_at).await?;

        self.enter(CycleState::Acquire);
        let reading = self.acquire(early).await;
        report.reading = reading;
        if !reading.valid {
            return Err(CycleError::InvalidReading);
        }

        self.enter(CycleState::Publish);
        let now = self.clock.now();
        let timeouts = &self.config.timeouts;
        let published = self
            .publisher
            .publish(
                reading,
                Deadline::after(now, timeouts.mqtt()),
                Deadline::after(now, timeouts.http()),
                self.network.watcher(),
            )
            .await;
        report.broker = Some(published.broker);
        report.http = Some(published.http);
        if published.any_error() {
            warn!("Publishing incomplete this cycle");
        }

        Ok(())
    }

    async fn connect_link(&self, started_at: Timestamp) -> Result<(), NetworkError> {
        let timeouts = &self.config.timeouts;
        let budget = if self.network.was_associated() {
            self.network.fast_reconnect()?;
            timeouts.fast_reconnect()
        } else {
            self.network.bring_up()?;
            timeouts.connect()
        };

        let deadline = self.clock.deadline(Deadline::after(started_at, budget));
        match self.network.watcher().wait_up(deadline).await {
            Ok(_) => Ok(()),
            Err(e) => {
                self.network.expire();
                Err(e)
            }
        }
    }

    async fn acquire(&self, early: Option<JoinHandle<Reading>>) -> Reading {
        let handle = early.unwrap_or_else(|| SensorAcquisition::spawn(&self.acquisition));
        match handle.await {
            Ok(reading) => reading,
            Err(e) => {
                warn!("Sensor task failed: {}", e);
                Reading::invalid()
            }
        }
    }
}
