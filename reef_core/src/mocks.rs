//! In-memory stand-ins for the external collaborators.
//!
//! Used by the test suites and handy for simulations: every fake records
//! what it was asked to do so callers can assert on it.
use crossbeam_channel as xch;
use reef_traits::{
    Actuator, AnalogInput, BoxError, Job, JobHandle, JobScheduler, Measurement, RecordStore, Stats,
    Telemetry,
};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::probe::{CalibrationPoint, Calibrator, Probe};
use crate::ticks::TickSource;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Bucketed in-memory record store with sequential numeric ids.
#[derive(Debug, Default)]
pub struct MemoryStore {
    buckets: Mutex<HashMap<String, BTreeMap<String, Vec<u8>>>>,
    next_id: AtomicU64,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in `bucket`.
    pub fn len(&self, bucket: &str) -> usize {
        lock(&self.buckets).get(bucket).map_or(0, BTreeMap::len)
    }

    /// Successful create/update/delete calls so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every subsequent write fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), BoxError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err("store is read-only".into());
        }
        Ok(())
    }
}

impl RecordStore for MemoryStore {
    fn get(&self, bucket: &str, id: &str) -> Result<Option<Vec<u8>>, BoxError> {
        Ok(lock(&self.buckets)
            .get(bucket)
            .and_then(|b| b.get(id))
            .cloned())
    }

    fn create(
        &self,
        bucket: &str,
        record: &mut dyn FnMut(&str) -> Result<Vec<u8>, BoxError>,
    ) -> Result<String, BoxError> {
        self.check_writable()?;
        let id = (self.next_id.fetch_add(1, Ordering::SeqCst) + 1).to_string();
        let bytes = record(&id)?;
        lock(&self.buckets)
            .entry(bucket.to_string())
            .or_default()
            .insert(id.clone(), bytes);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    fn update(&self, bucket: &str, id: &str, record: &[u8]) -> Result<(), BoxError> {
        self.check_writable()?;
        let mut buckets = lock(&self.buckets);
        let slot = buckets
            .get_mut(bucket)
            .and_then(|b| b.get_mut(id))
            .ok_or_else(|| format!("{bucket}/{id} does not exist"))?;
        *slot = record.to_vec();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn delete(&self, bucket: &str, id: &str) -> Result<(), BoxError> {
        self.check_writable()?;
        lock(&self.buckets)
            .get_mut(bucket)
            .and_then(|b| b.remove(id))
            .ok_or_else(|| format!("{bucket}/{id} does not exist"))?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn list(
        &self,
        bucket: &str,
        visit: &mut dyn FnMut(&[u8]) -> Result<(), BoxError>,
    ) -> Result<(), BoxError> {
        let records: Vec<Vec<u8>> = lock(&self.buckets)
            .get(bucket)
            .map(|b| b.values().cloned().collect())
            .unwrap_or_default();
        for r in &records {
            visit(r)?;
        }
        Ok(())
    }
}

/// Scheduler that never fires on its own; tests call `fire`.
#[derive(Default)]
pub struct ManualScheduler {
    jobs: Mutex<HashMap<JobHandle, (String, Arc<dyn Job>)>>,
    next: AtomicU64,
    removed: AtomicUsize,
    reject: AtomicBool,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        lock(&self.jobs).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered handles with their specs, ordered by handle.
    pub fn jobs(&self) -> Vec<(JobHandle, String)> {
        let mut jobs: Vec<_> = lock(&self.jobs)
            .iter()
            .map(|(h, (spec, _))| (*h, spec.clone()))
            .collect();
        jobs.sort_by_key(|(h, _)| h.0);
        jobs
    }

    /// Remove calls that matched a registered job.
    pub fn removed(&self) -> usize {
        self.removed.load(Ordering::SeqCst)
    }

    /// Make `add_job` fail.
    pub fn reject_jobs(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    /// Run the job behind `handle` on the caller's thread. Returns false for
    /// unknown handles.
    pub fn fire(&self, handle: JobHandle) -> bool {
        let job = lock(&self.jobs).get(&handle).map(|(_, j)| Arc::clone(j));
        match job {
            Some(j) => {
                j.run();
                true
            }
            None => false,
        }
    }
}

impl JobScheduler for ManualScheduler {
    fn add_job(&self, spec: &str, job: Box<dyn Job>) -> Result<JobHandle, BoxError> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(format!("scheduler rejected '{spec}'").into());
        }
        let handle = JobHandle(self.next.fetch_add(1, Ordering::SeqCst) + 1);
        lock(&self.jobs).insert(handle, (spec.to_string(), Arc::from(job)));
        Ok(handle)
    }

    fn remove(&self, handle: JobHandle) {
        if lock(&self.jobs).remove(&handle).is_some() {
            self.removed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[derive(Debug, Default)]
pub struct RecordingStats {
    updates: Mutex<Vec<(String, Measurement)>>,
    deleted: Mutex<Vec<String>>,
    fail_delete: AtomicBool,
}

impl RecordingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<(String, Measurement)> {
        lock(&self.updates).clone()
    }

    pub fn updates_for(&self, id: &str) -> Vec<Measurement> {
        lock(&self.updates)
            .iter()
            .filter(|(i, _)| i == id)
            .map(|(_, m)| *m)
            .collect()
    }

    pub fn deleted(&self) -> Vec<String> {
        lock(&self.deleted).clone()
    }

    pub fn fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }
}

impl Stats for RecordingStats {
    fn update(&self, id: &str, m: Measurement) {
        lock(&self.updates).push((id.to_string(), m));
    }

    fn delete(&self, id: &str) -> Result<(), BoxError> {
        lock(&self.deleted).push(id.to_string());
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(format!("no readings for {id}").into());
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingTelemetry {
    feeds: Mutex<Vec<String>>,
    metrics: Mutex<Vec<(String, String, f64)>>,
    errors: Mutex<Vec<(String, String)>>,
    alerts: Mutex<Vec<(String, String)>>,
}

impl RecordingTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feeds(&self) -> Vec<String> {
        lock(&self.feeds).clone()
    }

    /// `(kind, name, value)` triples.
    pub fn metrics(&self) -> Vec<(String, String, f64)> {
        lock(&self.metrics).clone()
    }

    /// `(tag, message)` pairs.
    pub fn errors(&self) -> Vec<(String, String)> {
        lock(&self.errors).clone()
    }

    /// `(subject, body)` pairs.
    pub fn alerts(&self) -> Vec<(String, String)> {
        lock(&self.alerts).clone()
    }
}

impl Telemetry for RecordingTelemetry {
    fn create_feed_if_not_exist(&self, name: &str) {
        let mut feeds = lock(&self.feeds);
        if !feeds.iter().any(|f| f == name) {
            feeds.push(name.to_string());
        }
    }

    fn emit_metric(&self, kind: &str, name: &str, value: f64) {
        lock(&self.metrics).push((kind.to_string(), name.to_string(), value));
    }

    fn log_error(&self, tag: &str, message: &str) {
        lock(&self.errors).push((tag.to_string(), message.to_string()));
    }

    fn alert(&self, subject: &str, body: &str) {
        lock(&self.alerts).push((subject.to_string(), body.to_string()));
    }
}

/// Analog input that replays scripted results, then repeats a fallback value.
#[derive(Debug)]
pub struct ScriptedAnalog {
    script: Mutex<VecDeque<Result<f64, String>>>,
    fallback: f64,
    reads: AtomicUsize,
}

impl ScriptedAnalog {
    pub fn new(fallback: f64) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            reads: AtomicUsize::new(0),
        }
    }

    pub fn then_ok(self, value: f64) -> Self {
        lock(&self.script).push_back(Ok(value));
        self
    }

    pub fn then_err(self, msg: &str) -> Self {
        lock(&self.script).push_back(Err(msg.to_string()));
        self
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl AnalogInput for ScriptedAnalog {
    fn read(&self, _channel: &str) -> Result<f64, BoxError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        match lock(&self.script).pop_front() {
            Some(Ok(v)) => Ok(v),
            Some(Err(msg)) => Err(msg.into()),
            None => Ok(self.fallback),
        }
    }
}

/// Records every `(pin, value)` written.
#[derive(Debug, Default)]
pub struct RecordingActuator {
    writes: Mutex<Vec<(String, f64)>>,
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> Vec<(String, f64)> {
        lock(&self.writes).clone()
    }
}

impl Actuator for RecordingActuator {
    fn set(&self, pin: &str, value: f64) -> Result<(), BoxError> {
        lock(&self.writes).push((pin.to_string(), value));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingCalibrator {
    calls: Mutex<Vec<(String, CalibrationPoint, f64)>>,
}

impl RecordingCalibrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(probe id, point, value)` per call.
    pub fn calls(&self) -> Vec<(String, CalibrationPoint, f64)> {
        lock(&self.calls).clone()
    }
}

impl Calibrator for RecordingCalibrator {
    fn calibrate(&self, probe: &Probe, point: CalibrationPoint, value: f64) -> Result<(), BoxError> {
        lock(&self.calls).push((probe.id.clone(), point, value));
        Ok(())
    }
}

/// Tick source driven by the test: each `ticks` call opens a new timer and
/// `tick` pushes one tick into it.
#[derive(Debug, Default)]
pub struct ManualTicks {
    timers: Mutex<Vec<(Duration, xch::Sender<Instant>)>>,
}

impl ManualTicks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timers opened so far, including ones whose task has gone.
    pub fn opened(&self) -> usize {
        lock(&self.timers).len()
    }

    pub fn period(&self, timer: usize) -> Option<Duration> {
        lock(&self.timers).get(timer).map(|(p, _)| *p)
    }

    /// Deliver one tick to `timer`. False if the timer is unknown or its task
    /// has dropped the receiver.
    pub fn tick(&self, timer: usize) -> bool {
        lock(&self.timers)
            .get(timer)
            .is_some_and(|(_, tx)| tx.send(Instant::now()).is_ok())
    }

    /// Deliver one tick to the most recently opened timer.
    pub fn tick_latest(&self) -> bool {
        match self.opened() {
            0 => false,
            n => self.tick(n - 1),
        }
    }
}

impl TickSource for ManualTicks {
    fn ticks(&self, period: Duration) -> xch::Receiver<Instant> {
        let (tx, rx) = xch::unbounded();
        lock(&self.timers).push((period, tx));
        rx
    }
}
