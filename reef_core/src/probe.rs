//! pH probe records and the probe controller.
use std::sync::Arc;
use std::time::Duration;

use reef_traits::{AnalogInput, BoxError, Stats, Telemetry};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::boundary;
use crate::config::ProbeSettings;
use crate::controller::Controller;
use crate::device::{Device, Launcher};
use crate::error::{ControllerError, Result};
use crate::poller::{PollContext, PollHandle, TaskStatus};
use crate::ticks::{IntervalTicks, TickSource};

/// Alert thresholds for a probe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Notify {
    pub enable: bool,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Probe {
    pub id: String,
    pub name: String,
    pub enable: bool,
    /// Sampling period in seconds; must be positive.
    pub period: i64,
    /// Analog channel the probe is wired to.
    pub analog_input: String,
    /// Reading feeds an automatic control loop.
    pub control: bool,
    pub notify: Notify,
}

impl Probe {
    pub fn period_duration(&self) -> Option<Duration> {
        u64::try_from(self.period)
            .ok()
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
    }

    pub fn feed_name(&self) -> String {
        format!("ph-{}", self.name)
    }

    pub(crate) fn error_tag(&self) -> String {
        format!("ph-{}", self.id)
    }
}

impl Device for Probe {
    const BUCKET: &'static str = "phprobes";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: &str) {
        self.id = id.to_string();
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self) -> Result<()> {
        if self.period <= 0 {
            return Err(ControllerError::Validation(format!(
                "period should be positive, supplied: {}",
                self.period
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalibrationPoint {
    High,
    Mid,
    Low,
}

/// One calibration step: the reference solution's value at a given point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbeCalibration {
    pub value: f64,
    #[serde(rename = "type")]
    pub point: CalibrationPoint,
}

/// Probe calibration driver.
pub trait Calibrator: Send + Sync {
    fn calibrate(&self, probe: &Probe, point: CalibrationPoint, value: f64)
    -> std::result::Result<(), BoxError>;
}

/// Accepts every calibration request without touching hardware.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCalibrator;

impl Calibrator for NoopCalibrator {
    fn calibrate(
        &self,
        probe: &Probe,
        point: CalibrationPoint,
        value: f64,
    ) -> std::result::Result<(), BoxError> {
        warn!(probe = %probe.name, ?point, value, "no calibration driver attached, request ignored");
        Ok(())
    }
}

/// Starts and stops polling threads for probes.
pub struct ProbeRuntime {
    ctx: Arc<PollContext>,
    ticks: Arc<dyn TickSource>,
    calibrator: Arc<dyn Calibrator>,
    settings: ProbeSettings,
}

impl ProbeRuntime {
    pub fn new(
        analog: Arc<dyn AnalogInput>,
        stats: Arc<dyn Stats>,
        telemetry: Arc<dyn Telemetry>,
    ) -> Self {
        let settings = ProbeSettings::default();
        Self {
            ctx: Arc::new(PollContext {
                analog,
                stats,
                telemetry,
                dev_mode: settings.dev_mode,
            }),
            ticks: Arc::new(IntervalTicks),
            calibrator: Arc::new(NoopCalibrator),
            settings,
        }
    }

    pub fn with_settings(mut self, settings: ProbeSettings) -> Self {
        Arc::make_mut(&mut self.ctx).dev_mode = settings.dev_mode;
        self.settings = settings;
        self
    }

    pub fn with_ticks(mut self, ticks: Arc<dyn TickSource>) -> Self {
        self.ticks = ticks;
        self
    }

    pub fn with_calibrator(mut self, calibrator: Arc<dyn Calibrator>) -> Self {
        self.calibrator = calibrator;
        self
    }
}

impl Launcher<Probe> for ProbeRuntime {
    type Work = PollHandle;

    fn wants_work(&self, probe: &Probe) -> bool {
        probe.enable
    }

    fn disable_work(&self, probe: &mut Probe) {
        probe.enable = false;
    }

    fn start(&self, probe: &Probe) -> Result<PollHandle> {
        PollHandle::spawn(probe.clone(), Arc::clone(&self.ctx), self.ticks.as_ref())
            .map_err(|e| ControllerError::Spawn(e.to_string()))
    }

    fn cancel(&self, _id: &str, work: &mut PollHandle) {
        work.cancel();
    }

    fn on_delete(&self, id: &str) {
        if let Err(e) = self.ctx.stats.delete(id) {
            warn!(id, error = %e, "failed to delete readings for probe");
        }
    }
}

pub type ProbeController = Controller<Probe, ProbeRuntime>;

impl ProbeController {
    /// One-off reading outside the polling loop.
    pub fn read(&self, probe: &Probe) -> Result<f64> {
        self.launcher()
            .ctx
            .read(probe)
            .map_err(|e| boundary::hardware(&*e))
    }

    /// Calibrate a probe at one point. Polling must be disabled first.
    pub fn calibrate(&self, id: &str, details: ProbeCalibration) -> Result<()> {
        let settings = &self.launcher().settings;
        if !(details.value > settings.calibration_min && details.value <= settings.calibration_max)
        {
            return Err(ControllerError::Validation(format!(
                "invalid calibration value {}, expected above {} and at most {}",
                details.value, settings.calibration_min, settings.calibration_max
            )));
        }
        let probe = self.get(id)?;
        if probe.enable {
            return Err(ControllerError::validation(
                "probe must be disabled from automatic polling before running calibration",
            ));
        }
        info!(probe = %probe.name, point = ?details.point, value = details.value, "calibrating probe");
        self.launcher()
            .calibrator
            .calibrate(&probe, details.point, details.value)
            .map_err(|e| boundary::hardware(&*e))
    }

    /// Status of the polling task registered for `id`, if any. The returned
    /// view keeps reporting after the task is replaced or stopped.
    pub fn task_status(&self, id: &str) -> Option<TaskStatus> {
        self.with_work(id, PollHandle::status)
    }
}
