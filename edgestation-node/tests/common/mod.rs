//! Common test utilities for node integration tests
//!
//! This module provides:
//! - A scripted in-memory broker and weather endpoint
//! - A station builder wiring simulated peripherals into a [`Node`]
//! - Reading fixtures

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use edgestation_connectors::{
    BrokerClient, BrokerEvent, BrokerSession, ConnectionStats, ConnectorError, QoS, WeatherEndpoint, WeatherUpdate,
};
use edgestation_core::{PhyMode, SleepMode};
use edgestation_node::hal::RawMeasurement;
use edgestation_node::sim::{HostPower, InstantDelay, SensorProbe, SimLink, SimPowerPin, SimRadio, SimSensor, SimSwitch};
use edgestation_node::{Channels, Node, Peripherals, StationConfig};

pub const TOPIC: &str = "WeatherStation";
pub const STATION_ID: &str = "KTEST1";
pub const API_KEY: &str = "secret";

/// The reading used throughout the round-trip tests
pub const ROUND_TRIP: RawMeasurement = RawMeasurement {
    temperature: 22.5,
    humidity: 45.0,
    pressure: 1013.25,
};

/// Humidity out of range
pub const GLITCH: RawMeasurement = RawMeasurement {
    temperature: 22.5,
    humidity: 104.0,
    pressure: 1013.25,
};

/// How the mock broker treats sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerBehaviour {
    /// Acknowledge every publish
    AckAll,
    /// Acknowledge the first `n` publishes of each session, then go quiet
    AckFirst(u16),
    /// Never acknowledge
    NeverAck,
    /// The first `n` sessions are dropped after the first publish
    DropSessions(u32),
}

/// Everything the mock broker saw
#[derive(Debug, Default)]
pub struct BrokerLog {
    pub sessions: u32,
    pub opened_at: Vec<Instant>,
    pub link_dropped_at: Option<Instant>,
    pub closed: u32,
    pub publishes: Vec<(String, String)>,
    pub qos: Vec<QoS>,
    pub retain: Vec<bool>,
}

/// Link loss injected during the first session's first publish
#[derive(Clone)]
pub struct LinkDrop {
    pub radio: SimRadio,
    /// Access point behaviour once the link is gone
    pub then: SimLink,
}

/// In-memory broker
#[derive(Clone)]
pub struct MockBroker {
    behaviour: BrokerBehaviour,
    link_drop: Option<LinkDrop>,
    log: Arc<Mutex<BrokerLog>>,
}

impl MockBroker {
    pub fn new(behaviour: BrokerBehaviour, link_drop: Option<LinkDrop>) -> Self {
        Self {
            behaviour,
            link_drop,
            log: Arc::new(Mutex::new(BrokerLog::default())),
        }
    }

    pub fn opened_at(&self) -> Vec<Instant> {
        self.log.lock().unwrap().opened_at.clone()
    }

    pub fn link_dropped_at(&self) -> Option<Instant> {
        self.log.lock().unwrap().link_dropped_at
    }

    pub fn sessions(&self) -> u32 {
        self.log.lock().unwrap().sessions
    }

    pub fn closed(&self) -> u32 {
        self.log.lock().unwrap().closed
    }

    pub fn publishes(&self) -> Vec<(String, String)> {
        self.log.lock().unwrap().publishes.clone()
    }

    pub fn retained(&self) -> bool {
        self.log.lock().unwrap().retain.iter().all(|r| *r)
    }
}

#[async_trait]
impl BrokerClient for MockBroker {
    async fn open(&self) -> Result<Box<dyn BrokerSession>, ConnectorError> {
        let number = {
            let mut log = self.log.lock().unwrap();
            log.sessions += 1;
            log.opened_at.push(Instant::now());
            log.sessions
        };
        Ok(Box::new(MockSession {
            behaviour: self.behaviour,
            link_drop: if number == 1 { self.link_drop.clone() } else { None },
            number,
            sent: 0,
            events: VecDeque::from([BrokerEvent::Connected]),
            log: Arc::clone(&self.log),
        }))
    }

    fn base_topic(&self) -> &str {
        TOPIC
    }

    fn qos(&self) -> QoS {
        QoS::ExactlyOnce
    }

    fn retain(&self) -> bool {
        true
    }

    fn stats(&self) -> ConnectionStats {
        let log = self.log.lock().unwrap();
        ConnectionStats {
            sessions: log.sessions,
            messages_sent: log.publishes.len() as u64,
            ..ConnectionStats::default()
        }
    }
}

struct MockSession {
    behaviour: BrokerBehaviour,
    link_drop: Option<LinkDrop>,
    number: u32,
    sent: u16,
    events: VecDeque<BrokerEvent>,
    log: Arc<Mutex<BrokerLog>>,
}

#[async_trait]
impl BrokerSession for MockSession {
    async fn publish(&mut self, topic: &str, payload: Vec<u8>, qos: QoS, retain: bool) -> Result<(), ConnectorError> {
        {
            let mut log = self.log.lock().unwrap();
            log.publishes.push((topic.to_string(), String::from_utf8(payload).unwrap()));
            log.qos.push(qos);
            log.retain.push(retain);
        }
        self.sent += 1;

        if let Some(lost) = self.link_drop.take() {
            lost.radio.set_link(lost.then);
            lost.radio.drop_link();
            self.log.lock().unwrap().link_dropped_at = Some(Instant::now());
            self.events.push_back(BrokerEvent::Disconnected);
            return Ok(());
        }

        let ack = BrokerEvent::Acknowledged { message_id: self.sent };

        match self.behaviour {
            BrokerBehaviour::AckAll => self.events.push_back(ack),
            BrokerBehaviour::AckFirst(n) if self.sent <= n => self.events.push_back(ack),
            BrokerBehaviour::AckFirst(_) | BrokerBehaviour::NeverAck => {}
            BrokerBehaviour::DropSessions(n) if self.number <= n => {
                if self.sent == 1 {
                    self.events.push_back(BrokerEvent::Disconnected);
                }
            }
            BrokerBehaviour::DropSessions(_) => self.events.push_back(ack),
        }
        Ok(())
    }

    async fn next_event(&mut self) -> Option<BrokerEvent> {
        match self.events.pop_front() {
            Some(event) => Some(event),
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) {
        self.log.lock().unwrap().closed += 1;
    }
}

/// How the mock weather endpoint answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointBehaviour {
    /// HTTP 200
    Accept,
    /// Server error
    Reject,
    /// Never answers
    Hang,
}

/// In-memory weather endpoint recording query strings
#[derive(Clone)]
pub struct MockEndpoint {
    behaviour: EndpointBehaviour,
    queries: Arc<Mutex<Vec<String>>>,
}

impl MockEndpoint {
    pub fn new(behaviour: EndpointBehaviour) -> Self {
        Self {
            behaviour,
            queries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl WeatherEndpoint for MockEndpoint {
    async fn submit(&self, update: &WeatherUpdate) -> Result<u16, ConnectorError> {
        self.queries.lock().unwrap().push(update.to_query_string());
        match self.behaviour {
            EndpointBehaviour::Accept => Ok(200),
            EndpointBehaviour::Reject => Err(ConnectorError::ProtocolError("HTTP 500".to_string())),
            EndpointBehaviour::Hang => std::future::pending().await,
        }
    }
}

/// A node on simulated hardware plus handles to inspect it
pub struct Station {
    pub node: Node,
    pub config: StationConfig,
    pub probe: Arc<SensorProbe>,
    pub radio: SimRadio,
    pub power: Arc<HostPower>,
    pub switch: Arc<SimSwitch>,
    pub delay: InstantDelay,
    pub broker: MockBroker,
    pub endpoint: MockEndpoint,
}

/// Builds a [`Station`]; defaults to a healthy HE link and a 22.5 °C reading
pub struct StationBuilder {
    config: StationConfig,
    script: Vec<RawMeasurement>,
    steady: RawMeasurement,
    link: SimLink,
    switch_on: bool,
    failing_force: Option<usize>,
    link_drop: Option<SimLink>,
    broker: BrokerBehaviour,
    endpoint: EndpointBehaviour,
}

impl Default for StationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StationBuilder {
    pub fn new() -> Self {
        let mut config = StationConfig::default();
        config.weather.station_id = STATION_ID.to_string();
        config.weather.api_key = API_KEY.to_string();
        config.broker.topic = TOPIC.to_string();

        Self {
            config,
            script: Vec::new(),
            steady: ROUND_TRIP,
            link: SimLink {
                available: true,
                address_delay: Duration::from_millis(1200),
                phy: PhyMode::He20,
                accept_wake_schedule: true,
            },
            switch_on: true,
            failing_force: None,
            link_drop: None,
            broker: BrokerBehaviour::AckAll,
            endpoint: EndpointBehaviour::Accept,
        }
    }

    pub fn config(mut self, f: impl FnOnce(&mut StationConfig)) -> Self {
        f(&mut self.config);
        self
    }

    pub fn sleep_mode(self, mode: SleepMode) -> Self {
        self.config(|c| {
            c.sleep_mode = mode;
            c.tickless_idle = mode == SleepMode::AutomaticLight;
        })
    }

    pub fn reading(mut self, steady: RawMeasurement) -> Self {
        self.steady = steady;
        self
    }

    /// Measurements returned before the steady value, throw-away first
    pub fn script(mut self, script: Vec<RawMeasurement>) -> Self {
        self.script = script;
        self
    }

    pub fn link_available(mut self, available: bool) -> Self {
        self.link.available = available;
        self
    }

    pub fn phy(mut self, phy: PhyMode) -> Self {
        self.link.phy = phy;
        self
    }

    pub fn switch_on(mut self, on: bool) -> Self {
        self.switch_on = on;
        self
    }

    /// The `nth` conversion request fails, throw-away counted as 1
    pub fn failing_force(mut self, nth: usize) -> Self {
        self.failing_force = Some(nth);
        self
    }

    /// Drop the link during the first broker session; it comes back after
    /// `reassociate`, or never when `None`
    pub fn link_drop(mut self, reassociate: Option<Duration>) -> Self {
        let mut then = self.link;
        match reassociate {
            Some(delay) => then.address_delay = delay,
            None => then.available = false,
        }
        self.link_drop = Some(then);
        self
    }

    pub fn broker(mut self, behaviour: BrokerBehaviour) -> Self {
        self.broker = behaviour;
        self
    }

    pub fn endpoint(mut self, behaviour: EndpointBehaviour) -> Self {
        self.endpoint = behaviour;
        self
    }

    /// Must be called inside a tokio runtime
    pub fn build(self) -> Station {
        let probe = Arc::new(SensorProbe::default());
        let mut sensor = SimSensor::scripted(self.script.into_iter().map(Ok), self.steady, Arc::clone(&probe));
        if let Some(nth) = self.failing_force {
            sensor = sensor.fail_force_on(nth);
        }
        let radio = SimRadio::new(self.link);
        let power = Arc::new(HostPower::default());
        let switch = Arc::new(SimSwitch::new(self.switch_on));
        let delay = InstantDelay::default();
        let link_drop = self.link_drop.map(|then| LinkDrop { radio: radio.clone(), then });
        let broker = MockBroker::new(self.broker, link_drop);
        let endpoint = MockEndpoint::new(self.endpoint);

        let peripherals = Peripherals {
            sensor: Box::new(sensor),
            sensor_power: Box::new(SimPowerPin::new(Arc::clone(&probe))),
            delay: Box::new(delay.clone()),
            switch: switch.clone(),
            radio: Arc::new(radio.clone()),
            power: power.clone(),
        };
        let channels = Channels {
            broker: Arc::new(broker.clone()),
            weather: Arc::new(endpoint.clone()),
        };

        Station {
            node: Node::new(self.config.clone(), peripherals, channels),
            config: self.config,
            probe,
            radio,
            power,
            switch,
            delay,
            broker,
            endpoint,
        }
    }
}

/// Query parameter value, if present
pub fn query_param<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v)
}
