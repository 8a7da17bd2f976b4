//! Sleep scheduler
//!
//! Carries out the cycle's [`SleepDecision`]. The wake-up instant is fixed
//! when the decision is made, so time spent entering a sleep state comes
//! out of the sleep rather than stretching the period.

use std::sync::Arc;
use std::time::Duration;

use edgestation_core::SleepDecision;
use log::{info, warn};
use tokio::time::{sleep_until, Instant};

use crate::hal::PowerControl;
use crate::network::NetworkLifecycle;

/// How the node continues after sleeping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// Memory and link survived; start the next cycle in place
    Resume,
    /// Nothing survives; rebuild the node from configuration
    Reboot,
}

/// Executes sleep decisions
pub struct SleepScheduler {
    power: Arc<dyn PowerControl>,
}

impl SleepScheduler {
    /// Scheduler over the CPU power states
    pub fn new(power: Arc<dyn PowerControl>) -> Self {
        Self { power }
    }

    /// Sleep as decided at `decided_at`
    pub async fn execute(&self, decision: SleepDecision, decided_at: Instant, network: &NetworkLifecycle) -> Wake {
        let wake_at = decided_at + decision.duration();
        let remaining = || wake_at.saturating_duration_since(Instant::now());

        match decision {
            SleepDecision::RestartNow => {
                info!("Restarting without sleep");
                Wake::Reboot
            }
            SleepDecision::Deep(_) => {
                let duration = remaining();
                info!("Deep sleep for {}", format_duration(duration));
                self.power.deep_sleep(duration).await;
                Wake::Reboot
            }
            SleepDecision::LightAutomatic(_) => {
                info!("Automatic light sleep for {}", format_duration(remaining()));
                self.power.set_automatic_light_sleep(true);
                if let Err(e) = network.set_power_save(true) {
                    warn!("Could not enable modem power-save: {}", e);
                }
                sleep_until(wake_at).await;
                if let Err(e) = network.set_power_save(false) {
                    warn!("Could not disable modem power-save: {}", e);
                }
                self.power.set_automatic_light_sleep(false);
                Wake::Resume
            }
            SleepDecision::LightManual(_) => {
                if let Err(e) = network.suspend().await {
                    warn!("Radio did not stop cleanly: {}", e);
                }
                let duration = remaining();
                info!("Light sleep for {}", format_duration(duration));
                self.power.light_sleep(duration).await;
                if let Err(e) = network.resume() {
                    warn!("Radio did not restart: {}", e);
                }
                Wake::Resume
            }
        }
    }
}

/// `"12 min 30 s"` style rendering for logs
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    match (secs / 60, secs % 60) {
        (0, s) => format!("{} s", s),
        (m, 0) => format!("{} min", m),
        (m, s) => format!("{} min {} s", m, s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{HostPower, SimLink, SimRadio, SleepKind};
    use edgestation_core::{LinkState, PhyMode, WakeSchedule};

    fn network() -> (SimRadio, NetworkLifecycle) {
        let radio = SimRadio::new(SimLink {
            available: true,
            address_delay: Duration::from_millis(100),
            phy: PhyMode::He20,
            accept_wake_schedule: true,
        });
        let network = NetworkLifecycle::new(Arc::new(radio.clone()), WakeSchedule::default());
        (radio, network)
    }

    #[test]
    fn durations_read_naturally() {
        assert_eq!(format_duration(Duration::from_secs(45)), "45 s");
        assert_eq!(format_duration(Duration::from_secs(900)), "15 min");
        assert_eq!(format_duration(Duration::from_secs(750)), "12 min 30 s");
    }

    #[tokio::test(start_paused = true)]
    async fn restart_now_does_not_sleep() {
        let power = Arc::new(HostPower::default());
        let scheduler = SleepScheduler::new(power.clone());
        let (_, network) = network();

        let before = Instant::now();
        let wake = scheduler.execute(SleepDecision::RestartNow, before, &network).await;
        assert_eq!(wake, Wake::Reboot);
        assert_eq!(Instant::now(), before);
        assert!(power.sleeps().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn deep_sleep_subtracts_time_since_decision() {
        let power = Arc::new(HostPower::default());
        let scheduler = SleepScheduler::new(power.clone());
        let (_, network) = network();

        let decided_at = Instant::now();
        tokio::time::sleep(Duration::from_secs(5)).await;
        let wake = scheduler.execute(SleepDecision::Deep(Duration::from_secs(60)), decided_at, &network).await;

        assert_eq!(wake, Wake::Reboot);
        assert_eq!(power.sleeps(), vec![(SleepKind::Deep, Duration::from_secs(55))]);
        assert_eq!(Instant::now(), decided_at + Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn automatic_light_sleep_keeps_link() {
        let power = Arc::new(HostPower::default());
        let scheduler = SleepScheduler::new(power.clone());
        let (radio, network) = network();
        network.bring_up().unwrap();
        network.watcher().wait_up(Instant::now() + Duration::from_secs(1)).await.unwrap();

        let decided_at = Instant::now();
        let wake = scheduler
            .execute(SleepDecision::LightAutomatic(Duration::from_secs(30)), decided_at, &network)
            .await;

        assert_eq!(wake, Wake::Resume);
        assert_eq!(Instant::now(), decided_at + Duration::from_secs(30));
        assert!(!power.automatic_light_sleep());
        assert!(!radio.power_save());
        assert!(network.status().is_up());
        assert_eq!(radio.stops(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_light_sleep_cycles_radio() {
        let power = Arc::new(HostPower::default());
        let scheduler = SleepScheduler::new(power.clone());
        let (radio, network) = network();
        network.bring_up().unwrap();
        network.watcher().wait_up(Instant::now() + Duration::from_secs(1)).await.unwrap();

        let wake = scheduler
            .execute(SleepDecision::LightManual(Duration::from_secs(30)), Instant::now(), &network)
            .await;

        assert_eq!(wake, Wake::Resume);
        assert_eq!(radio.stops(), 1);
        assert_eq!(radio.starts(), 2);
        assert_eq!(power.sleeps().len(), 1);
        assert_eq!(power.sleeps()[0].0, SleepKind::Light);

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(network.status().state, LinkState::Connecting);
    }
}
