//! Publish coordinator
//!
//! Runs the HTTP and broker channels as two tasks, each against its own
//! absolute deadline. Every task owns its [`PublishOutcome`] and hands it
//! back through its join handle; nothing is shared while they run.

mod broker;
mod weather;

pub use broker::{BrokerChannel, MAX_SESSION_ATTEMPTS};
pub use weather::WeatherChannel;

use std::time::Duration;

use edgestation_connectors::{ConnectionStats, ConnectorError};
use edgestation_core::{constants::time::PUBLISH_STAGGER_MS, Deadline, PublishOutcome, Reading, TimeSource, Timestamp};
use log::warn;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout_at};

use crate::clock::TokioClock;
use crate::network::LinkWatcher;

/// Extra time given to a channel task to hand back its outcome
const JOIN_GRACE: Duration = Duration::from_secs(1);

/// Broker session failures
#[derive(Debug, Error)]
pub enum PublishError {
    /// Connector failed
    #[error(transparent)]
    Connector(#[from] ConnectorError),

    /// Session ended before every metric was acknowledged
    #[error("Session lost after {confirmed} acknowledgements")]
    SessionLost { confirmed: u8 },

    /// Channel deadline passed
    #[error("Deadline passed")]
    Timeout,
}

/// Outcome of both channels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishReport {
    /// Broker channel
    pub broker: PublishOutcome,
    /// HTTP channel
    pub http: PublishOutcome,
}

impl PublishReport {
    /// Either channel ended in error
    pub fn any_error(&self) -> bool {
        self.broker.error || self.http.error
    }
}

/// Starts both channels and collects their outcomes
pub struct PublishCoordinator {
    broker: BrokerChannel,
    weather: WeatherChannel,
    clock: TokioClock,
}

impl PublishCoordinator {
    /// Coordinator over the two channels
    pub fn new(broker: BrokerChannel, weather: WeatherChannel, clock: TokioClock) -> Self {
        Self { broker, weather, clock }
    }

    /// Broker client totals since the node was built
    pub fn broker_stats(&self) -> ConnectionStats {
        self.broker.stats()
    }

    /// Publish `reading` on both channels
    ///
    /// HTTP starts first; the broker follows after a short stagger to spread
    /// the current draw. A channel that has not reported shortly after its
    /// deadline is left running and counted as an error.
    pub async fn publish(
        &self,
        reading: Reading,
        broker_deadline: Deadline,
        http_deadline: Deadline,
        link: LinkWatcher,
    ) -> PublishReport {
        let started = self.clock.now();

        let http = tokio::spawn(self.weather.clone().run(reading, http_deadline));
        sleep(Duration::from_millis(PUBLISH_STAGGER_MS)).await;
        let broker = tokio::spawn(self.broker.clone().run(reading, broker_deadline, link));

        let http = self.join("HTTP", http, started, http_deadline).await;
        let broker = self.join("broker", broker, started, broker_deadline).await;

        PublishReport { broker, http }
    }

    async fn join(
        &self,
        channel: &str,
        handle: JoinHandle<PublishOutcome>,
        started: Timestamp,
        deadline: Deadline,
    ) -> PublishOutcome {
        let limit = self.clock.deadline(deadline) + JOIN_GRACE;
        match timeout_at(limit, handle).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                warn!("{} channel task failed: {}", channel, e);
                PublishOutcome::overdue(started, deadline)
            }
            Err(_) => {
                warn!("{} channel overran its deadline", channel);
                PublishOutcome::overdue(started, deadline)
            }
        }
    }
}
