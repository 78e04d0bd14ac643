//! Bounded dispense action shared by scheduled dosing and calibration.
//!
//! Drives one actuator pin at `speed` for `duration`, then sets it back to 0.
//! No state survives between runs apart from the actuator itself.
use std::sync::Arc;
use std::time::Duration;

use reef_traits::{Actuator, Clock, Job};
use tracing::{debug, error, info};

pub struct Dispense {
    pin: String,
    speed: f64,
    duration: Duration,
    actuator: Arc<dyn Actuator>,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl Dispense {
    pub fn new(
        pin: impl Into<String>,
        speed: f64,
        duration: Duration,
        actuator: Arc<dyn Actuator>,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        Self {
            pin: pin.into(),
            speed,
            duration,
            actuator,
            clock,
        }
    }

    /// Returns how long the pump ran by the injected clock, or `None` if it
    /// never started.
    pub fn run_once(&self) -> Option<Duration> {
        info!(pin = %self.pin, speed = self.speed, duration_s = self.duration.as_secs(), "dispensing");
        if let Err(e) = self.actuator.set(&self.pin, self.speed) {
            error!(pin = %self.pin, error = %e, "failed to start pump");
            return None;
        }
        let started = self.clock.now();
        self.clock.sleep(self.duration);
        let ran = self.clock.now().saturating_duration_since(started);
        if let Err(e) = self.actuator.set(&self.pin, 0.0) {
            error!(pin = %self.pin, error = %e, "failed to stop pump");
        }
        debug!(pin = %self.pin, ran_s = ran.as_secs_f64(), "dispense finished");
        Some(ran)
    }

    /// Run on a detached thread. The caller does not learn when, or whether,
    /// the dispense finished.
    pub fn spawn_detached(self) -> std::io::Result<()> {
        std::thread::Builder::new()
            .name(format!("dispense-{}", self.pin))
            .spawn(move || {
                self.run_once();
            })?;
        Ok(())
    }
}

impl Job for Dispense {
    fn run(&self) {
        self.run_once();
    }
}
