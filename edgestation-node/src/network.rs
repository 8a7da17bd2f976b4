//! Network lifecycle
//!
//! A single ingestion task owns the link status. Radio events and control
//! events from the node arrive on one queue, go through
//! [`edgestation_core::link::transition`] and the result is published on a
//! `watch` channel. Reconnection after an unexpected disconnect happens here
//! without the orchestrator's involvement; callers only bound their waits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use edgestation_core::{
    constants::time::RADIO_STOP_TIMEOUT_MS, link::transition, LinkAction, LinkEvent, LinkState, LinkStatus,
    WakeSchedule,
};
use log::{debug, info, warn};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{timeout, timeout_at, Instant};

use crate::hal::{LinkEventSender, Radio, RadioError};

/// Link errors
#[derive(Debug, Error)]
pub enum NetworkError {
    /// Radio driver refused a request
    #[error("Radio error: {0}")]
    Radio(#[from] RadioError),

    /// Link did not reach the wanted state in time
    #[error("Link not ready within {0:?}")]
    Timeout(Duration),

    /// Ingestion task has stopped
    #[error("Link state channel closed")]
    Closed,
}

/// Read side of the link status
#[derive(Debug, Clone)]
pub struct LinkWatcher {
    rx: watch::Receiver<LinkStatus>,
}

impl LinkWatcher {
    /// Latest status
    pub fn current(&self) -> LinkStatus {
        *self.rx.borrow()
    }

    /// Wait until the link is Up or `deadline` passes
    pub async fn wait_up(&mut self, deadline: Instant) -> Result<LinkStatus, NetworkError> {
        let started = Instant::now();
        match timeout_at(deadline, self.rx.wait_for(LinkStatus::is_up)).await {
            Ok(Ok(status)) => Ok(*status),
            Ok(Err(_)) => Err(NetworkError::Closed),
            Err(_) => Err(NetworkError::Timeout(deadline.saturating_duration_since(started))),
        }
    }

    /// Wait until the link is Down, bounded by `limit`
    async fn wait_down(&mut self, limit: Duration) -> Result<(), NetworkError> {
        match timeout(limit, self.rx.wait_for(|s| s.state == LinkState::Down)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(NetworkError::Closed),
            Err(_) => Err(NetworkError::Timeout(limit)),
        }
    }
}

/// Owner of the station link
pub struct NetworkLifecycle {
    radio: Arc<dyn Radio>,
    events: LinkEventSender,
    watcher: LinkWatcher,
    associated: Arc<AtomicBool>,
    radio_on: AtomicBool,
    ingest: JoinHandle<()>,
}

impl NetworkLifecycle {
    /// Start the ingestion task; the radio stays off until [`Self::bring_up`]
    pub fn new(radio: Arc<dyn Radio>, wake_schedule: WakeSchedule) -> Self {
        let (events, rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(LinkStatus::default());
        let associated = Arc::new(AtomicBool::new(false));

        let ingest = tokio::spawn(ingest(
            rx,
            status_tx,
            Arc::clone(&radio),
            events.clone(),
            wake_schedule,
            Arc::clone(&associated),
        ));

        Self {
            radio,
            events,
            watcher: LinkWatcher { rx: status_rx },
            associated,
            radio_on: AtomicBool::new(false),
            ingest,
        }
    }

    /// Start the radio and request association; returns immediately
    pub fn bring_up(&self) -> Result<(), NetworkError> {
        info!("Bringing up link");
        self.start_radio()
    }

    /// Reconnect after light sleep
    ///
    /// Nothing to do while the radio is on: the link either survived or the
    /// ingestion task is already reconnecting it. The radio flag is checked
    /// rather than the published state, which lags a start still queued for
    /// the ingestion task.
    pub fn fast_reconnect(&self) -> Result<(), NetworkError> {
        if self.radio_on.load(Ordering::SeqCst) {
            return Ok(());
        }
        info!("Fast reconnect");
        self.start_radio()
    }

    /// Link reached Up at least once since this lifecycle was built
    pub fn was_associated(&self) -> bool {
        self.associated.load(Ordering::SeqCst)
    }

    /// Report that a caller gave up waiting for Up
    pub fn expire(&self) {
        let _ = self.events.send(LinkEvent::WaitExpired);
    }

    /// Latest status
    pub fn status(&self) -> LinkStatus {
        self.watcher.current()
    }

    /// New read handle on the status
    pub fn watcher(&self) -> LinkWatcher {
        self.watcher.clone()
    }

    /// Stop the radio for manual light sleep without triggering a reconnect
    pub async fn suspend(&self) -> Result<(), NetworkError> {
        self.send(LinkEvent::SleepRequested)?;
        self.radio.stop()?;
        self.radio_on.store(false, Ordering::SeqCst);
        let mut watcher = self.watcher();
        watcher.wait_down(Duration::from_millis(RADIO_STOP_TIMEOUT_MS)).await
    }

    /// Restart the radio after manual light sleep
    pub fn resume(&self) -> Result<(), NetworkError> {
        self.send(LinkEvent::SleepEnded)?;
        self.start_radio()
    }

    /// Modem power-save between beacons
    pub fn set_power_save(&self, enabled: bool) -> Result<(), NetworkError> {
        self.radio.set_power_save(enabled)?;
        Ok(())
    }

    fn start_radio(&self) -> Result<(), NetworkError> {
        self.radio.start(self.events.clone())?;
        self.radio_on.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn send(&self, event: LinkEvent) -> Result<(), NetworkError> {
        self.events.send(event).map_err(|_| NetworkError::Closed)
    }
}

impl Drop for NetworkLifecycle {
    fn drop(&mut self) {
        self.ingest.abort();
    }
}

async fn ingest(
    mut rx: mpsc::UnboundedReceiver<LinkEvent>,
    status_tx: watch::Sender<LinkStatus>,
    radio: Arc<dyn Radio>,
    events: LinkEventSender,
    wake_schedule: WakeSchedule,
    associated: Arc<AtomicBool>,
) {
    let mut status = LinkStatus::default();

    while let Some(event) = rx.recv().await {
        let (next, action) = transition(status, event);
        if next.state != status.state {
            debug!("Link {:?} -> {:?} on {:?}", status.state, next.state, event);
        }
        match event {
            LinkEvent::Disconnected if !status.sleeping => warn!("Link lost, reconnecting"),
            LinkEvent::BeaconTimeout => warn!("Beacon timeout"),
            LinkEvent::WakeScheduleAccepted if next.extended_wake => {
                info!("Extended wake schedule accepted ({:?} interval)", wake_schedule.interval())
            }
            LinkEvent::WakeScheduleRejected => info!("No extended wake schedule"),
            _ => {}
        }
        if next.is_up() {
            associated.store(true, Ordering::SeqCst);
        }

        status = next;
        status_tx.send_replace(status);

        match action {
            LinkAction::None => {}
            LinkAction::Connect => {
                if let Err(e) = radio.connect() {
                    warn!("Connect request failed: {}", e);
                }
            }
            LinkAction::NegotiateWakeSchedule => {
                info!("Link up");
                let supported = radio.phy_mode().map_or(false, |phy| phy.supports_wake_schedule());
                if !supported {
                    let _ = events.send(LinkEvent::WakeScheduleRejected);
                } else if let Err(e) = radio.request_wake_schedule(&wake_schedule) {
                    warn!("Wake schedule request failed: {}", e);
                    let _ = events.send(LinkEvent::WakeScheduleRejected);
                }
            }
        }
    }
}
