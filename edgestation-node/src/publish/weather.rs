//! HTTP weather channel
//!
//! Single shot: one request, no retry. The enable switch is read once when
//! the channel starts; an open switch skips the channel without touching
//! the network.

use std::sync::Arc;

use edgestation_connectors::{WeatherEndpoint, WeatherUpdate};
use edgestation_core::{Deadline, PublishOutcome, Reading, TimeSource};
use log::{info, warn};
use tokio::time::timeout_at;

use crate::clock::TokioClock;
use crate::hal::SwitchInput;

/// HTTP channel for one cycle
#[derive(Clone)]
pub struct WeatherChannel {
    endpoint: Arc<dyn WeatherEndpoint>,
    switch: Arc<dyn SwitchInput>,
    station_id: String,
    api_key: String,
    clock: TokioClock,
}

impl WeatherChannel {
    /// Channel submitting to `endpoint` while `switch` is closed
    pub fn new(
        endpoint: Arc<dyn WeatherEndpoint>,
        switch: Arc<dyn SwitchInput>,
        station_id: impl Into<String>,
        api_key: impl Into<String>,
        clock: TokioClock,
    ) -> Self {
        Self {
            endpoint,
            switch,
            station_id: station_id.into(),
            api_key: api_key.into(),
            clock,
        }
    }

    /// Submit `reading` once, bounded by `deadline`
    pub async fn run(self, reading: Reading, deadline: Deadline) -> PublishOutcome {
        let now = self.clock.now();
        if !self.switch.is_low() {
            info!("HTTP publishing switched off");
            return PublishOutcome::skipped(now);
        }

        let outcome = PublishOutcome::started(now, deadline);
        let update = WeatherUpdate::from_reading(&reading, self.station_id.as_str(), self.api_key.as_str());

        match timeout_at(self.clock.deadline(deadline), self.endpoint.submit(&update)).await {
            Ok(Ok(status)) => {
                info!("Weather update accepted ({})", status);
                outcome.complete()
            }
            Ok(Err(e)) => {
                warn!("Weather update failed: {}", e);
                outcome.fail()
            }
            Err(_) => {
                warn!("Weather update timed out");
                outcome.fail()
            }
        }
    }
}
