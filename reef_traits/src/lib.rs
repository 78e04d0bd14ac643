//! Boundary traits for the collaborators the reef controllers depend on.
//!
//! Everything here is implemented outside the core: the record store, the
//! cron scheduler, the stats and telemetry services, and the hardware
//! drivers. Errors cross these boundaries as `BoxError` and are mapped to
//! typed errors by `reef_core`.
pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

use std::time::SystemTime;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Keyed record storage, partitioned into buckets.
///
/// Records are opaque bytes; identifiers are assigned by the store on create.
pub trait RecordStore: Send + Sync {
    /// `Ok(None)` when no record exists under `id`.
    fn get(&self, bucket: &str, id: &str) -> Result<Option<Vec<u8>>, BoxError>;

    /// Allocate an identifier and persist whatever `record` builds for it.
    fn create(
        &self,
        bucket: &str,
        record: &mut dyn FnMut(&str) -> Result<Vec<u8>, BoxError>,
    ) -> Result<String, BoxError>;

    fn update(&self, bucket: &str, id: &str, record: &[u8]) -> Result<(), BoxError>;

    fn delete(&self, bucket: &str, id: &str) -> Result<(), BoxError>;

    /// Visit every record in the bucket; the first visitor error aborts the walk.
    fn list(
        &self,
        bucket: &str,
        visit: &mut dyn FnMut(&[u8]) -> Result<(), BoxError>,
    ) -> Result<(), BoxError>;
}

/// A unit of work the scheduler runs on every matching tick.
pub trait Job: Send + Sync {
    fn run(&self);
}

/// Opaque handle returned by a scheduler for a registered job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobHandle(pub u64);

impl std::fmt::Display for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job#{}", self.0)
    }
}

/// Cron-style job scheduler.
pub trait JobScheduler: Send + Sync {
    fn add_job(&self, spec: &str, job: Box<dyn Job>) -> Result<JobHandle, BoxError>;
    /// Removing an unknown handle is a no-op.
    fn remove(&self, handle: JobHandle);
}

/// One aggregable sample.
///
/// `len` and `sum` let the stats service merge samples into averages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub time: SystemTime,
    pub value: f64,
    pub len: u32,
    pub sum: f64,
}

impl Measurement {
    /// Single reading stamped with `time`.
    pub fn sample_at(value: f64, time: SystemTime) -> Self {
        Self {
            time,
            value,
            len: 1,
            sum: value,
        }
    }
}

/// Per-device sample aggregation.
pub trait Stats: Send + Sync {
    fn update(&self, id: &str, m: Measurement);
    fn delete(&self, id: &str) -> Result<(), BoxError>;
}

/// Metrics, error events and alerts.
pub trait Telemetry: Send + Sync {
    fn create_feed_if_not_exist(&self, name: &str);
    fn emit_metric(&self, kind: &str, name: &str, value: f64);
    fn log_error(&self, tag: &str, message: &str);
    fn alert(&self, subject: &str, body: &str);
}

/// Analog input channels (pH probes hang off these).
pub trait AnalogInput: Send + Sync {
    fn read(&self, channel: &str) -> Result<f64, BoxError>;
}

/// Variable-voltage outputs driving dosing pumps; `value` is percent duty.
pub trait Actuator: Send + Sync {
    fn set(&self, pin: &str, value: f64) -> Result<(), BoxError>;
}
