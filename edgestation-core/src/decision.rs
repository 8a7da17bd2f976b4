//! Sleep Strategy Selection
//!
//! Picks what the node does between cycles. The rules, in priority order:
//!
//! 1. The active phase used the whole period: restart now, no wait.
//! 2. Any serious problem (link down, invalid reading, a channel error):
//!    deep sleep, whatever the configured preference.
//! 3. The extended wake schedule was not negotiated: deep sleep.
//! 4. Otherwise the configured preference.
//!
//! Deep sleep is the robust option because it does not rely on the link
//! surviving the pause. The problem rule always beats user preference.

use core::fmt;
use core::time::Duration;

use crate::budget::CycleBudget;

/// Configured low-power strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum SleepMode {
    /// Power everything down; the process restarts on wake
    #[default]
    Deep,
    /// Radio power-save between beacon windows, state preserved
    AutomaticLight,
    /// Radio stopped and CPU light-slept explicitly, state preserved
    ManualLight,
    /// Wake driven by an external timer circuit (not supported)
    ExternalTimer,
}

impl SleepMode {
    /// True for the modes that keep in-memory state and the association
    pub fn keeps_link(&self) -> bool {
        matches!(self, Self::AutomaticLight | Self::ManualLight)
    }
}

impl fmt::Display for SleepMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Deep => "deep",
            Self::AutomaticLight => "automatic-light",
            Self::ManualLight => "manual-light",
            Self::ExternalTimer => "external-timer",
        };
        f.write_str(name)
    }
}

/// What to do at the end of a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepDecision {
    /// Deep sleep for the duration, then restart
    Deep(Duration),
    /// Power-save with the link kept alive
    LightAutomatic(Duration),
    /// Stop the radio and light sleep
    LightManual(Duration),
    /// Restart immediately
    RestartNow,
}

impl SleepDecision {
    /// Wait carried by the decision; zero for an immediate restart
    pub fn duration(&self) -> Duration {
        match self {
            Self::Deep(d) | Self::LightAutomatic(d) | Self::LightManual(d) => *d,
            Self::RestartNow => Duration::ZERO,
        }
    }

    /// True when waking from this decision restarts the process
    pub fn restarts(&self) -> bool {
        matches!(self, Self::Deep(_) | Self::RestartNow)
    }
}

/// Inputs to the sleep decision, gathered over one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleSignals {
    /// Link reached Up this cycle
    pub link_up: bool,
    /// Acquisition produced a valid reading
    pub reading_valid: bool,
    /// Broker channel reported an error
    pub broker_error: bool,
    /// HTTP channel reported an error
    pub http_error: bool,
    /// Extended wake schedule was accepted by the access point
    pub extended_wake: bool,
}

impl CycleSignals {
    /// Any of the conditions that force deep sleep
    pub fn serious_problem(&self) -> bool {
        !self.link_up || !self.reading_valid || self.broker_error || self.http_error
    }
}

/// Choose the end-of-cycle action
pub fn decide_sleep(preference: SleepMode, signals: &CycleSignals, budget: &CycleBudget) -> SleepDecision {
    if budget.is_overrun() {
        log_warn!(
            "cycle took {:?}, longer than the {:?} period; restarting now",
            budget.elapsed(),
            budget.period()
        );
        return SleepDecision::RestartNow;
    }

    let residual = budget.residual();

    if signals.serious_problem() {
        if preference != SleepMode::Deep {
            log_warn!("serious problem this cycle, forcing deep sleep over {}", preference);
        }
        return SleepDecision::Deep(residual);
    }

    if !signals.extended_wake {
        if preference.keeps_link() {
            log_debug!("no extended wake schedule, using deep sleep instead of {}", preference);
        }
        return SleepDecision::Deep(residual);
    }

    match preference {
        SleepMode::AutomaticLight => SleepDecision::LightAutomatic(residual),
        SleepMode::ManualLight => SleepDecision::LightManual(residual),
        SleepMode::Deep | SleepMode::ExternalTimer => SleepDecision::Deep(residual),
    }
}
