//! Broker channel: publish and confirm
//!
//! Up to [`MAX_SESSION_ATTEMPTS`] sessions share one absolute deadline.
//! Each session publishes the three metrics once the broker accepts it and
//! is complete only when the broker acknowledged all of them. Every session
//! is closed before the next attempt or the return, whatever the result.

use std::sync::Arc;
use std::time::Duration;

use edgestation_connectors::{BrokerClient, BrokerEvent, BrokerSession, ConnectionStats};
use edgestation_core::{
    constants::time::SESSION_RETRY_PAUSE_MS, ConfirmTracker, Deadline, Metric, PublishOutcome, Reading,
    SessionAction, SessionEvent, SessionPhase, TimeSource,
};
use log::{debug, info, warn};
use tokio::time::{sleep_until, timeout_at, Instant};

use super::PublishError;
use crate::clock::TokioClock;
use crate::network::LinkWatcher;

/// Sessions tried within one deadline
pub const MAX_SESSION_ATTEMPTS: u32 = 3;

/// Broker channel for one cycle
#[derive(Clone)]
pub struct BrokerChannel {
    client: Arc<dyn BrokerClient>,
    clock: TokioClock,
}

impl BrokerChannel {
    /// Channel publishing through `client`
    pub fn new(client: Arc<dyn BrokerClient>, clock: TokioClock) -> Self {
        Self { client, clock }
    }

    /// Totals kept by the broker client
    pub fn stats(&self) -> ConnectionStats {
        self.client.stats()
    }

    /// Publish `reading` and wait for confirmation until `deadline`
    pub async fn run(self, reading: Reading, deadline: Deadline, mut link: LinkWatcher) -> PublishOutcome {
        let outcome = PublishOutcome::started(self.clock.now(), deadline);
        let until = self.clock.deadline(deadline);

        for attempt in 1..=MAX_SESSION_ATTEMPTS {
            if let Err(e) = link.wait_up(until).await {
                warn!("Broker channel gave up waiting for the link: {}", e);
                return outcome.fail();
            }

            match self.attempt(&reading, until).await {
                Ok(()) => {
                    info!("Broker confirmed all readings (session {})", attempt);
                    return outcome.complete();
                }
                Err(PublishError::Timeout) => {
                    warn!("Broker channel deadline passed in session {}", attempt);
                    return outcome.fail();
                }
                Err(e) => warn!("Broker session {}/{} failed: {}", attempt, MAX_SESSION_ATTEMPTS, e),
            }

            if attempt < MAX_SESSION_ATTEMPTS {
                let pause = Instant::now() + Duration::from_millis(SESSION_RETRY_PAUSE_MS);
                sleep_until(pause.min(until)).await;
            }
        }

        warn!("Broker channel failed after {} sessions", MAX_SESSION_ATTEMPTS);
        outcome.fail()
    }

    async fn attempt(&self, reading: &Reading, until: Instant) -> Result<(), PublishError> {
        let mut session = match timeout_at(until, self.client.open()).await {
            Ok(session) => session?,
            Err(_) => return Err(PublishError::Timeout),
        };

        let result = timeout_at(until, self.drive(session.as_mut(), reading))
            .await
            .unwrap_or(Err(PublishError::Timeout));
        session.close().await;
        result
    }

    async fn drive(&self, session: &mut dyn BrokerSession, reading: &Reading) -> Result<(), PublishError> {
        let mut phase = SessionPhase::default();
        let mut tracker = ConfirmTracker::default();

        while let Some(event) = session.next_event().await {
            if let BrokerEvent::Error(message) = &event {
                warn!("Broker error: {}", message);
            }

            let (next, action) = phase.on_event(SessionEvent::from(&event), &mut tracker);
            phase = next;

            if phase.is_terminal() {
                return match phase {
                    SessionPhase::Confirmed => Ok(()),
                    _ => Err(PublishError::SessionLost { confirmed: tracker.confirmed() }),
                };
            }
            if action == SessionAction::PublishReadings {
                self.publish_readings(session, reading).await?;
            }
        }

        Err(PublishError::SessionLost { confirmed: tracker.confirmed() })
    }

    async fn publish_readings(&self, session: &mut dyn BrokerSession, reading: &Reading) -> Result<(), PublishError> {
        let qos = self.client.qos();
        let retain = self.client.retain();

        for metric in Metric::ALL {
            let topic = format!("{}/{}", self.client.base_topic(), metric);
            let payload = format!("{}", reading.value(metric));
            debug!("Publishing {} = {}", topic, payload);
            session.publish(&topic, payload.into_bytes(), qos, retain).await?;
        }
        Ok(())
    }
}
