//! EdgeStation node runtime
//!
//! Runs the duty cycle on top of the pure logic in `edgestation-core`:
//!
//! ```text
//! Validate ──▶ ConnectLink ──▶ Acquire ──▶ Publish ──▶ DecideSleep ──▶ Sleeping
//!    │              │             │                                       │
//!    └──────────────┴─────────────┴──▶ restart after delay                │
//!                                                                         ▼
//!                                               deep: process restarts, light: loop
//! ```
//!
//! Hardware is reached through the traits in [`hal`]; [`sim`] provides host
//! implementations used by the binary and the tests.

pub mod clock;
pub mod config;
pub mod hal;
pub mod logger;
pub mod network;
pub mod orchestrator;
pub mod publish;
pub mod sensor;
pub mod sim;
pub mod sleep;

pub use config::{ConfigError, StationConfig};
pub use orchestrator::{Channels, CycleReport, CycleState, Node, Peripherals};
pub use sleep::Wake;
