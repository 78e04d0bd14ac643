//! Dosing pump records and the pump controller.
//!
//! Scheduler jobs for pumps are owned by `schedule`: updating a pump record
//! persists it but leaves its job alone.
use std::sync::Arc;
use std::time::Duration;

use reef_traits::{Actuator, Clock, JobHandle, JobScheduler, MonotonicClock};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::boundary;
use crate::config::PumpSettings;
use crate::controller::Controller;
use crate::device::{Device, Launcher};
use crate::dispense::Dispense;
use crate::error::{ControllerError, Result};
use crate::schedule::CronSpec;

/// When and how much a pump doses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DosingRegimen {
    pub enable: bool,
    pub schedule: CronSpec,
    /// Seconds the pump runs per tick.
    pub duration: u64,
    /// Percent duty while running.
    pub speed: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pump {
    pub id: String,
    pub name: String,
    pub enable: bool,
    /// Actuator pin/channel driving the pump.
    pub pin: String,
    pub regimen: DosingRegimen,
}

impl Device for Pump {
    const BUCKET: &'static str = "doser";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: &str) {
        self.id = id.to_string();
    }

    fn name(&self) -> &str {
        &self.name
    }

    /// Only an enabled regimen has to be schedulable.
    fn validate(&self) -> Result<()> {
        if self.regimen.enable {
            self.regimen.schedule.validate()?;
        }
        Ok(())
    }
}

/// Caller-supplied parameters for a one-off calibration run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PumpCalibration {
    /// Seconds to run.
    pub duration: u64,
    pub speed: f64,
}

/// Registers and removes scheduler jobs for pumps.
pub struct PumpRuntime {
    scheduler: Arc<dyn JobScheduler>,
    actuator: Arc<dyn Actuator>,
    clock: Arc<dyn Clock + Send + Sync>,
    settings: PumpSettings,
}

impl PumpRuntime {
    pub fn new(scheduler: Arc<dyn JobScheduler>, actuator: Arc<dyn Actuator>) -> Self {
        Self {
            scheduler,
            actuator,
            clock: Arc::new(MonotonicClock::new()),
            settings: PumpSettings::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_settings(mut self, settings: PumpSettings) -> Self {
        self.settings = settings;
        self
    }

    fn dispense(&self, pin: &str, speed: f64, secs: u64) -> Dispense {
        Dispense::new(
            pin,
            speed,
            Duration::from_secs(secs),
            Arc::clone(&self.actuator),
            Arc::clone(&self.clock),
        )
    }
}

impl Launcher<Pump> for PumpRuntime {
    type Work = JobHandle;

    const RECONCILE_ON_UPDATE: bool = false;

    fn wants_work(&self, pump: &Pump) -> bool {
        pump.regimen.enable
    }

    fn disable_work(&self, pump: &mut Pump) {
        pump.regimen.enable = false;
    }

    fn start(&self, pump: &Pump) -> Result<JobHandle> {
        let r = &pump.regimen;
        let job = self.dispense(&pump.pin, r.speed, r.duration);
        let handle = self
            .scheduler
            .add_job(r.schedule.as_str(), Box::new(job))
            .map_err(boundary::scheduler)?;
        info!(pump = %pump.name, id = %pump.id, %handle, spec = %r.schedule, "dosing job added");
        Ok(handle)
    }

    fn cancel(&self, id: &str, handle: &mut JobHandle) {
        info!(id, %handle, "removing dosing job");
        self.scheduler.remove(*handle);
    }
}

pub type PumpController = Controller<Pump, PumpRuntime>;

impl PumpController {
    /// Persist `regimen` on the pump and re-register its scheduler job in
    /// the same critical section.
    ///
    /// If the scheduler refuses the job, the stored regimen is left disabled.
    pub fn schedule(&self, id: &str, regimen: DosingRegimen) -> Result<()> {
        regimen.schedule.validate()?;
        self.modify(id, |pump| pump.regimen = regimen)
    }

    /// Run the pump once with caller-supplied parameters.
    ///
    /// Returns as soon as the run is launched; the dispense itself happens on
    /// a detached thread and is not awaited.
    pub fn calibrate(&self, id: &str, cal: PumpCalibration) -> Result<()> {
        let settings = &self.launcher().settings;
        if cal.duration == 0 || cal.duration > settings.max_calibration_secs {
            return Err(ControllerError::Validation(format!(
                "calibration duration must be in 1..={} seconds, got {}",
                settings.max_calibration_secs, cal.duration
            )));
        }
        if !(cal.speed > 0.0 && cal.speed <= settings.max_speed) {
            return Err(ControllerError::Validation(format!(
                "calibration speed must be in (0, {}], got {}",
                settings.max_speed, cal.speed
            )));
        }
        let pump = self.get(id)?;
        info!(pump = %pump.name, duration_s = cal.duration, speed = cal.speed, "pump calibration run");
        self.launcher()
            .dispense(&pump.pin, cal.speed, cal.duration)
            .spawn_detached()
            .map_err(|e| ControllerError::Spawn(e.to_string()))
    }

    /// Scheduler handle registered for `id`, if any.
    pub fn job(&self, id: &str) -> Option<JobHandle> {
        self.with_work(id, |h| *h)
    }
}
