//! EdgeStation weather node
//!
//! Loads the configuration, then runs the duty cycle on simulated
//! peripherals. A deep sleep ends with the node being rebuilt from
//! scratch, the host equivalent of a reboot.

use std::process;
use std::time::Duration;

use anyhow::Context;
use edgestation_core::constants::time::DEFAULT_RESTART_DELAY_S;
use edgestation_node::sleep::format_duration;
use edgestation_node::{logger, sim, Channels, Node, StationConfig};
use log::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (config, path) = match StationConfig::new() {
        Ok(loaded) => loaded,
        Err(e) => {
            let _ = logger::init(&Default::default());
            error!("Failed to load configuration: {}", e);
            restart_after(Duration::from_secs(DEFAULT_RESTART_DELAY_S)).await;
            process::exit(1);
        }
    };

    logger::init(&config.logger).context("initialising logger")?;
    info!("EdgeStation {} starting", edgestation_core::VERSION);
    info!("Configuration loaded from {}", path.display());

    loop {
        let channels = match Channels::from_config(&config) {
            Ok(channels) => channels,
            Err(e) => {
                error!("Failed to build publish channels: {}", e);
                restart_after(config.timeouts.restart_delay()).await;
                process::exit(1);
            }
        };
        let mut node = Node::new(config.clone(), sim::peripherals(&config.simulation), channels);

        tokio::select! {
            report = node.run() => {
                info!("Cycle {} ended, rebooting", report.number);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                return Ok(());
            }
        }
    }
}

/// Bounded wait before exiting so the supervisor restarts the node
async fn restart_after(delay: Duration) {
    info!("Restarting in {}", format_duration(delay));
    tokio::time::sleep(delay).await;
}
