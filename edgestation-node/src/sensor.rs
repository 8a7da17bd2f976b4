//! Sensor acquisition
//!
//! One acquisition powers the sensor up, discards the first conversion and
//! then measures until a reading passes validation or the attempt budget is
//! spent. The supply is switched off by a drop guard, so every exit path
//! (valid reading, exhausted attempts, driver error, panic) leaves the
//! sensor unpowered before the bus is released.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use edgestation_core::{Reading, ReadingValidator};
use log::{debug, info, warn};
use tokio::task::JoinHandle;

use crate::config::SensorConfig;
use crate::hal::{Delay, EnvironmentalSensor, PowerPin, SensorError, SensorSettings};

/// Acquisition parameters
#[derive(Debug, Clone, Copy)]
pub struct AcquisitionPlan {
    /// Bus address of the sensor
    pub address: u8,
    /// Oversampling and filter settings
    pub settings: SensorSettings,
    /// Wait after power-on
    pub settle_time: Duration,
    /// Attempts after the throw-away measurement
    pub max_attempts: u32,
    /// Plausibility checks
    pub validator: ReadingValidator,
}

impl From<&SensorConfig> for AcquisitionPlan {
    fn from(config: &SensorConfig) -> Self {
        Self {
            address: config.i2c_address,
            settings: SensorSettings::default(),
            settle_time: Duration::from_millis(config.settle_time_ms),
            max_attempts: config.max_attempts,
            validator: ReadingValidator::default(),
        }
    }
}

/// Switches the supply off when dropped
struct PowerGuard<'a> {
    pin: &'a mut dyn PowerPin,
}

impl<'a> PowerGuard<'a> {
    fn on(pin: &'a mut dyn PowerPin) -> Self {
        pin.set_high();
        Self { pin }
    }
}

impl Drop for PowerGuard<'_> {
    fn drop(&mut self) {
        self.pin.set_low();
    }
}

/// Drives the sensor through power-on, measurement and power-off
pub struct SensorAcquisition {
    sensor: Box<dyn EnvironmentalSensor>,
    power: Box<dyn PowerPin>,
    delay: Box<dyn Delay>,
    plan: AcquisitionPlan,
}

impl SensorAcquisition {
    /// Acquisition over the given sensor, supply pin and delay
    pub fn new(
        sensor: Box<dyn EnvironmentalSensor>,
        power: Box<dyn PowerPin>,
        delay: Box<dyn Delay>,
        plan: AcquisitionPlan,
    ) -> Self {
        Self { sensor, power, delay, plan }
    }

    /// Take one reading
    ///
    /// Returns the first valid reading, or the last one with `valid` unset
    /// when every attempt failed or the driver gave up.
    pub fn acquire(&mut self) -> Reading {
        let result = {
            let _power = PowerGuard::on(self.power.as_mut());
            self.delay.delay(self.plan.settle_time);
            Self::measure(self.sensor.as_mut(), self.delay.as_mut(), &self.plan)
        };
        self.sensor.release();

        match result {
            Ok(reading) => reading,
            Err(e) => {
                warn!("Sensor driver error: {}", e);
                Reading::invalid()
            }
        }
    }

    /// Run [`Self::acquire`] on the blocking pool
    ///
    /// A poisoned lock or a panicking driver yields an invalid reading.
    pub fn spawn(shared: &Arc<Mutex<Self>>) -> JoinHandle<Reading> {
        let shared = Arc::clone(shared);
        tokio::task::spawn_blocking(move || match shared.lock() {
            Ok(mut acquisition) => acquisition.acquire(),
            Err(_) => {
                warn!("Sensor acquisition lock poisoned");
                Reading::invalid()
            }
        })
    }

    fn measure(
        sensor: &mut dyn EnvironmentalSensor,
        delay: &mut dyn Delay,
        plan: &AcquisitionPlan,
    ) -> Result<Reading, SensorError> {
        sensor.init(plan.address)?;
        sensor.configure(&plan.settings)?;

        // First conversion after power-on is unreliable
        sensor.force_measurement()?;
        delay.delay(sensor.measurement_duration());
        let _ = sensor.read();

        let mut last = Reading::invalid();
        for attempt in 1..=plan.max_attempts {
            sensor.force_measurement()?;
            delay.delay(sensor.measurement_duration());

            let raw = match sensor.read() {
                Ok(raw) => raw,
                Err(e) => {
                    debug!("Attempt {}/{}: read failed: {}", attempt, plan.max_attempts, e);
                    continue;
                }
            };

            last = plan.validator.evaluate(raw.temperature, raw.humidity, raw.pressure);
            if last.valid {
                info!(
                    "Reading: {:.2} °C, {:.2} %, {:.2} hPa (attempt {})",
                    last.temperature, last.humidity, last.pressure, attempt
                );
                return Ok(last);
            }
            debug!(
                "Attempt {}/{}: implausible values {:.2} °C, {:.2} %, {:.2} hPa",
                attempt, plan.max_attempts, raw.temperature, raw.humidity, raw.pressure
            );
        }

        warn!("No valid reading after {} attempts", plan.max_attempts);
        Ok(last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::RawMeasurement;
    use crate::sim::{InstantDelay, SensorProbe, SimPowerPin, SimSensor};

    const GOOD: RawMeasurement = RawMeasurement { temperature: 22.5, humidity: 45.0, pressure: 1013.25 };
    const GLITCH: RawMeasurement = RawMeasurement { temperature: 22.5, humidity: 120.0, pressure: 1013.25 };

    fn plan(max_attempts: u32) -> AcquisitionPlan {
        AcquisitionPlan {
            max_attempts,
            ..AcquisitionPlan::from(&SensorConfig::default())
        }
    }

    fn acquisition(sensor: SimSensor, probe: &Arc<SensorProbe>, delay: InstantDelay, attempts: u32) -> SensorAcquisition {
        SensorAcquisition::new(
            Box::new(sensor),
            Box::new(SimPowerPin::new(Arc::clone(probe))),
            Box::new(delay),
            plan(attempts),
        )
    }

    #[test]
    fn first_attempt_after_throw_away() {
        let probe = Arc::new(SensorProbe::default());
        let delay = InstantDelay::default();
        let sensor = SimSensor::steady(GOOD, Arc::clone(&probe));
        let mut acq = acquisition(sensor, &probe, delay.clone(), 10);

        let reading = acq.acquire();
        assert!(reading.valid);
        assert_eq!(reading.temperature, 22.5);
        assert_eq!(probe.measurements(), 2);
        assert!(!probe.is_powered());
        assert_eq!(probe.releases(), 1);
        assert!(!probe.released_while_powered());
        assert_eq!(delay.total(), Duration::from_millis(25 + 2 * 200));
    }

    #[test]
    fn glitches_are_retried() {
        let probe = Arc::new(SensorProbe::default());
        let script = vec![Ok(GLITCH), Ok(GLITCH), Err(SensorError::NotReady), Ok(GOOD)];
        let sensor = SimSensor::scripted(script, GLITCH, Arc::clone(&probe));
        let mut acq = acquisition(sensor, &probe, InstantDelay::default(), 10);

        // throw-away swallows the first glitch
        let reading = acq.acquire();
        assert!(reading.valid);
        assert_eq!(probe.measurements(), 4);
        assert!(!probe.is_powered());
    }

    #[test]
    fn throw_away_does_not_count() {
        let probe = Arc::new(SensorProbe::default());
        let sensor = SimSensor::scripted(vec![Ok(GLITCH)], GOOD, Arc::clone(&probe));
        let mut acq = acquisition(sensor, &probe, InstantDelay::default(), 1);

        assert!(acq.acquire().valid);
    }

    #[test]
    fn exhaustion_returns_last_invalid_reading() {
        let probe = Arc::new(SensorProbe::default());
        let sensor = SimSensor::steady(GLITCH, Arc::clone(&probe));
        let mut acq = acquisition(sensor, &probe, InstantDelay::default(), 3);

        let reading = acq.acquire();
        assert!(!reading.valid);
        assert_eq!(reading.humidity, 120.0);
        assert_eq!(probe.measurements(), 4);
        assert!(!probe.is_powered());
        assert!(!probe.released_while_powered());
    }

    #[test]
    fn driver_error_still_powers_off() {
        let probe = Arc::new(SensorProbe::default());
        let sensor = SimSensor::missing(Arc::clone(&probe));
        let mut acq = acquisition(sensor, &probe, InstantDelay::default(), 10);

        let reading = acq.acquire();
        assert!(!reading.valid);
        assert_eq!(probe.power_cycles(), 1);
        assert_eq!(probe.measurements(), 0);
        assert!(!probe.is_powered());
        assert_eq!(probe.releases(), 1);
    }

    #[test]
    fn conversion_failure_mid_sequence_powers_off() {
        let probe = Arc::new(SensorProbe::default());
        let sensor = SimSensor::steady(GLITCH, Arc::clone(&probe)).fail_force_on(4);
        let mut acq = acquisition(sensor, &probe, InstantDelay::default(), 10);

        let reading = acq.acquire();
        assert!(!reading.valid);
        assert_eq!(probe.measurements(), 3);
        assert!(!probe.is_powered());
        assert!(!probe.released_while_powered());
        assert_eq!(probe.releases(), 1);
    }

    #[tokio::test]
    async fn spawn_runs_on_blocking_pool() {
        let probe = Arc::new(SensorProbe::default());
        let sensor = SimSensor::steady(GOOD, Arc::clone(&probe));
        let shared = Arc::new(Mutex::new(acquisition(sensor, &probe, InstantDelay::default(), 10)));

        let reading = SensorAcquisition::spawn(&shared).await.unwrap();
        assert!(reading.valid);
        assert_eq!(probe.power_cycles(), 1);
    }
}
