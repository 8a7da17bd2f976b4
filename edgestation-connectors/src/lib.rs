//! Publish Channels for EdgeStation
//!
//! ## Overview
//!
//! A station reports every reading over two independent paths:
//!
//! ### MQTT broker
//!
//! One message per metric on `<base-topic>/<metric>`, fixed QoS and retain.
//! A session is opened per cycle and torn down afterwards; the node keeps
//! no connection across sleep. Delivery is confirmed only by the broker's
//! acknowledgement (PUBACK for QoS 1, PUBCOMP for QoS 2, the outgoing
//! write for QoS 0).
//!
//! ### HTTP weather endpoint
//!
//! One GET to a PWS-style `updateraw` endpoint carrying the reading in
//! imperial units. No retry.
//!
//! ## Connector Design
//!
//! The node never sees `rumqttc` or `ureq` types. It talks to:
//!
//! - [`BrokerClient`] / [`BrokerSession`]: open a session, publish, read
//!   [`BrokerEvent`]s, close
//! - [`WeatherEndpoint`]: submit one [`WeatherUpdate`]
//!
//! so tests can drive the publish coordinator with in-memory fakes.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use edgestation_connectors::{BrokerClient, QoS, mqtt::{MqttBroker, MqttConfig}};
//!
//! # async fn run() -> Result<(), edgestation_connectors::ConnectorError> {
//! let config = MqttConfig::new("mqtt://broker.local")
//!     .credentials("station", "secret")
//!     .topic("WeatherStation")
//!     .qos(QoS::ExactlyOnce);
//! let broker = MqttBroker::new(config)?;
//!
//! let mut session = broker.open().await?;
//! while let Some(event) = session.next_event().await {
//!     // publish on Connected, count acknowledgements
//! }
//! session.close().await;
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "mqtt")]
pub mod mqtt;

#[cfg(feature = "http")]
pub mod http;

pub mod weather;

// Re-export common types
#[cfg(feature = "mqtt")]
pub use mqtt::{MqttBroker, MqttConfig, MqttError};

#[cfg(feature = "http")]
pub use http::{HttpConfig, HttpError, PwsWeatherClient};

pub use weather::WeatherUpdate;

use edgestation_core::SessionEvent;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Common connector errors
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("Not connected")]
    NotConnected,

    #[error("Timeout")]
    Timeout,

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[cfg(feature = "mqtt")]
    #[error(transparent)]
    Mqtt(#[from] MqttError),

    #[cfg(feature = "http")]
    #[error(transparent)]
    Http(#[from] HttpError),
}

/// MQTT delivery guarantee
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum QoS {
    /// Fire and forget
    AtMostOnce,
    /// Acknowledged with PUBACK
    AtLeastOnce,
    /// Four-way handshake ending in PUBCOMP
    #[default]
    ExactlyOnce,
}

impl TryFrom<u8> for QoS {
    type Error = ConnectorError;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            other => Err(ConnectorError::ConfigError(format!("QoS must be 0, 1 or 2, got {}", other))),
        }
    }
}

impl From<QoS> for u8 {
    fn from(qos: QoS) -> u8 {
        match qos {
            QoS::AtMostOnce => 0,
            QoS::AtLeastOnce => 1,
            QoS::ExactlyOnce => 2,
        }
    }
}

/// Events reported by an open broker session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerEvent {
    /// Broker accepted the session
    Connected,
    /// Broker confirmed delivery of a message
    Acknowledged { message_id: u16 },
    /// Session closed
    Disconnected,
    /// Transport or protocol failure; the session is unusable
    Error(String),
}

impl From<&BrokerEvent> for SessionEvent {
    fn from(event: &BrokerEvent) -> Self {
        match event {
            BrokerEvent::Connected => SessionEvent::Connected,
            BrokerEvent::Acknowledged { message_id } => SessionEvent::Published { message_id: *message_id },
            BrokerEvent::Disconnected => SessionEvent::Disconnected,
            BrokerEvent::Error(_) => SessionEvent::Error,
        }
    }
}

/// Opens broker sessions
#[async_trait::async_trait]
pub trait BrokerClient: Send + Sync {
    /// Start a new session; completion is reported as [`BrokerEvent::Connected`]
    async fn open(&self) -> Result<Box<dyn BrokerSession>, ConnectorError>;

    /// Base topic that metric names are appended to
    fn base_topic(&self) -> &str;

    /// Delivery guarantee for every publish
    fn qos(&self) -> QoS;

    /// Retain flag for every publish
    fn retain(&self) -> bool;

    /// Get connection statistics
    fn stats(&self) -> ConnectionStats;
}

/// One broker session
#[async_trait::async_trait]
pub trait BrokerSession: Send {
    /// Queue a message for delivery
    async fn publish(&mut self, topic: &str, payload: Vec<u8>, qos: QoS, retain: bool) -> Result<(), ConnectorError>;

    /// Next session event; `None` once the session is gone
    async fn next_event(&mut self) -> Option<BrokerEvent>;

    /// Tear the session down
    async fn close(&mut self);
}

/// HTTP weather-aggregation endpoint
#[async_trait::async_trait]
pub trait WeatherEndpoint: Send + Sync {
    /// Submit one update, returning the HTTP status on success
    async fn submit(&self, update: &WeatherUpdate) -> Result<u16, ConnectorError>;
}

/// Connection statistics common to all connectors
#[derive(Debug, Default, Clone)]
pub struct ConnectionStats {
    /// Total messages sent successfully
    pub messages_sent: u64,
    /// Total messages failed to send
    pub messages_failed: u64,
    /// Total bytes sent
    pub bytes_sent: u64,
    /// Number of sessions opened
    pub sessions: u32,
    /// Last error message
    pub last_error: Option<String>,
}
