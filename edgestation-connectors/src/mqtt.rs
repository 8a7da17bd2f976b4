//! MQTT Connector
//!
//! ## Session Model
//!
//! The station does not hold a broker connection across sleep. Every cycle
//! opens a fresh session, publishes three messages and tears it down:
//!
//! ```text
//! open() ──▶ ConnAck ──▶ publish ×3 ──▶ PUBACK/PUBCOMP ×3 ──▶ close()
//! ```
//!
//! ## Event Loop
//!
//! `rumqttc` drives the connection from an `EventLoop` that must be polled.
//! Each session spawns one poll task that translates the raw packets into
//! [`BrokerEvent`]s. The task stops at the first connection error, so a
//! dropped session is never reconnected behind the caller's back; retrying
//! is the publish channel's decision.
//!
//! ## Keep-Alive
//!
//! The keep-alive is set longer than the reporting period so the broker
//! does not drop the session between publishes of a slow cycle.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{BrokerClient, BrokerEvent, BrokerSession, ConnectionStats, ConnectorError, QoS};

/// Capacity of the request queue between client and event loop
const REQUEST_CAPACITY: usize = 10;

/// Longest keep-alive the protocol can express
const MAX_KEEP_ALIVE: Duration = Duration::from_secs(u16::MAX as u64);

/// Time allowed for DISCONNECT to be written on close
const DISCONNECT_GRACE: Duration = Duration::from_millis(200);

/// MQTT-specific errors
#[derive(Debug, Error)]
pub enum MqttError {
    /// Broker URL could not be used
    #[error("Invalid broker URL: {0}")]
    InvalidUrl(String),

    /// Request could not be queued
    #[error("Client error: {0}")]
    Client(#[from] rumqttc::ClientError),
}

/// MQTT configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// Broker URL, `mqtt://host[:port]` or a bare host
    pub url: String,
    /// Port used when the URL carries none
    pub port: u16,
    /// Client identifier presented to the broker
    pub client_id: String,
    /// Username, empty for anonymous sessions
    pub username: String,
    /// Password
    pub password: String,
    /// Base topic; metric names are appended as `<topic>/<metric>`
    pub topic: String,
    /// Delivery guarantee
    pub qos: QoS,
    /// Retain flag
    pub retain: bool,
    /// Keep-alive interval
    #[serde(rename = "keep_alive_secs", with = "secs")]
    pub keep_alive: Duration,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self::new("mqtt://localhost")
    }
}

impl MqttConfig {
    /// Create new configuration for a broker URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            port: 1883,
            client_id: "edgestation".to_string(),
            username: String::new(),
            password: String::new(),
            topic: "WeatherStation".to_string(),
            qos: QoS::ExactlyOnce,
            retain: true,
            keep_alive: Duration::from_secs(60),
        }
    }

    /// Set credentials
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Set base topic
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    /// Set QoS
    pub fn qos(mut self, qos: QoS) -> Self {
        self.qos = qos;
        self
    }

    /// Set retain flag
    pub fn retain(mut self, retain: bool) -> Self {
        self.retain = retain;
        self
    }

    /// Set client id
    pub fn client_id(mut self, id: impl Into<String>) -> Self {
        self.client_id = id.into();
        self
    }

    /// Keep the session alive for at least `period` plus a minute
    pub fn keep_alive_for(mut self, period: Duration) -> Self {
        self.keep_alive = period.saturating_add(Duration::from_secs(60)).min(MAX_KEEP_ALIVE);
        self
    }

    /// Host and port the URL points at
    pub fn endpoint(&self) -> Result<(String, u16), MqttError> {
        let rest = match self.url.split_once("://") {
            Some(("mqtt" | "tcp", rest)) => rest,
            Some((scheme, _)) => {
                return Err(MqttError::InvalidUrl(format!("unsupported scheme {}", scheme)));
            }
            None => self.url.as_str(),
        };
        let rest = rest.trim_end_matches('/');

        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse()
                    .map_err(|_| MqttError::InvalidUrl(self.url.clone()))?;
                (host, port)
            }
            None => (rest, self.port),
        };

        if host.is_empty() {
            return Err(MqttError::InvalidUrl(self.url.clone()));
        }
        Ok((host.to_string(), port))
    }

    fn options(&self) -> Result<MqttOptions, MqttError> {
        let (host, port) = self.endpoint()?;
        let mut options = MqttOptions::new(self.client_id.clone(), host, port);
        options.set_keep_alive(self.keep_alive.max(Duration::from_secs(5)));
        options.set_clean_session(true);
        if !self.username.is_empty() {
            options.set_credentials(self.username.clone(), self.password.clone());
        }
        Ok(options)
    }
}

fn to_rumqttc(qos: QoS) -> rumqttc::QoS {
    match qos {
        QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
        QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
        QoS::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
    }
}

/// Translate a raw event into what the publish channel cares about
///
/// Only the acknowledgement matching the configured QoS counts as
/// delivery: PUBACK for QoS 1, PUBCOMP for QoS 2 and the outgoing write
/// itself for QoS 0.
pub fn translate(event: &Event, qos: QoS) -> Option<BrokerEvent> {
    match event {
        Event::Incoming(Packet::ConnAck(ack)) => match ack.code {
            ConnectReturnCode::Success => Some(BrokerEvent::Connected),
            code => Some(BrokerEvent::Error(format!("connection refused: {:?}", code))),
        },
        Event::Incoming(Packet::PubAck(ack)) if qos == QoS::AtLeastOnce => {
            Some(BrokerEvent::Acknowledged { message_id: ack.pkid })
        }
        Event::Incoming(Packet::PubComp(comp)) if qos == QoS::ExactlyOnce => {
            Some(BrokerEvent::Acknowledged { message_id: comp.pkid })
        }
        Event::Outgoing(Outgoing::Publish(pkid)) if qos == QoS::AtMostOnce => {
            Some(BrokerEvent::Acknowledged { message_id: *pkid })
        }
        Event::Incoming(Packet::Disconnect) | Event::Outgoing(Outgoing::Disconnect) => {
            Some(BrokerEvent::Disconnected)
        }
        _ => None,
    }
}

/// MQTT broker client
pub struct MqttBroker {
    config: MqttConfig,
    stats: Arc<Mutex<ConnectionStats>>,
}

impl MqttBroker {
    /// Create new broker client; validates the URL up front
    pub fn new(config: MqttConfig) -> Result<Self, ConnectorError> {
        config.endpoint()?;
        Ok(Self {
            config,
            stats: Arc::new(Mutex::new(ConnectionStats::default())),
        })
    }
}

#[async_trait::async_trait]
impl BrokerClient for MqttBroker {
    async fn open(&self) -> Result<Box<dyn BrokerSession>, ConnectorError> {
        let options = self.config.options()?;
        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let (tx, rx) = mpsc::unbounded_channel();
        let poller = tokio::spawn(poll(eventloop, tx, self.config.qos));

        if let Ok(mut stats) = self.stats.lock() {
            stats.sessions += 1;
        }

        Ok(Box::new(MqttSession {
            client,
            events: rx,
            poller,
            stats: Arc::clone(&self.stats),
        }))
    }

    fn base_topic(&self) -> &str {
        &self.config.topic
    }

    fn qos(&self) -> QoS {
        self.config.qos
    }

    fn retain(&self) -> bool {
        self.config.retain
    }

    fn stats(&self) -> ConnectionStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

async fn poll(mut eventloop: EventLoop, tx: mpsc::UnboundedSender<BrokerEvent>, qos: QoS) {
    loop {
        match eventloop.poll().await {
            Ok(event) => {
                if let Some(translated) = translate(&event, qos) {
                    let closed = translated == BrokerEvent::Disconnected;
                    if tx.send(translated).is_err() || closed {
                        break;
                    }
                }
            }
            Err(e) => {
                log::debug!("mqtt event loop stopped: {}", e);
                let _ = tx.send(BrokerEvent::Error(e.to_string()));
                break;
            }
        }
    }
}

/// One open MQTT session
pub struct MqttSession {
    client: AsyncClient,
    events: mpsc::UnboundedReceiver<BrokerEvent>,
    poller: JoinHandle<()>,
    stats: Arc<Mutex<ConnectionStats>>,
}

#[async_trait::async_trait]
impl BrokerSession for MqttSession {
    async fn publish(&mut self, topic: &str, payload: Vec<u8>, qos: QoS, retain: bool) -> Result<(), ConnectorError> {
        let len = payload.len() as u64;
        let result = self
            .client
            .publish(topic, to_rumqttc(qos), retain, payload)
            .await
            .map_err(MqttError::from);

        if let Ok(mut stats) = self.stats.lock() {
            match &result {
                Ok(()) => {
                    stats.messages_sent += 1;
                    stats.bytes_sent += len;
                }
                Err(e) => {
                    stats.messages_failed += 1;
                    stats.last_error = Some(e.to_string());
                }
            }
        }
        Ok(result?)
    }

    async fn next_event(&mut self) -> Option<BrokerEvent> {
        self.events.recv().await
    }

    async fn close(&mut self) {
        // Give the event loop a moment to flush DISCONNECT before stopping it
        if self.client.try_disconnect().is_ok() {
            let _ = tokio::time::timeout(DISCONNECT_GRACE, &mut self.poller).await;
        }
        self.poller.abort();
        self.events.close();
    }
}

impl Drop for MqttSession {
    fn drop(&mut self) {
        self.poller.abort();
    }
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}
