//! Background polling of pH probes.
//!
//! Each enabled probe gets one thread that waits on its timer or its
//! cancellation channel, whichever fires first. Read failures are reported
//! and the loop carries on; the only way out is cancellation.
//!
//! Safety: every `PollHandle` owns exactly one thread, which is cancelled
//! and joined when the handle is dropped, so tasks cannot leak.
use crossbeam_channel as xch;
use rand::Rng;
use reef_traits::{AnalogInput, BoxError, Measurement, Stats, Telemetry};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, error, info, trace, warn};

use crate::probe::Probe;
use crate::ticks::TickSource;

/// Lifecycle of a polling task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Running,
    Stopped,
}

/// Shared view of a task's state; stays valid after the task is gone.
#[derive(Debug, Clone)]
pub struct TaskStatus(Arc<AtomicU8>);

impl TaskStatus {
    fn new() -> Self {
        Self(Arc::new(AtomicU8::new(PollState::Idle as u8)))
    }

    fn set(&self, state: PollState) {
        self.0.store(state as u8, Ordering::Release);
    }

    pub fn get(&self) -> PollState {
        match self.0.load(Ordering::Acquire) {
            0 => PollState::Idle,
            1 => PollState::Running,
            _ => PollState::Stopped,
        }
    }
}

/// Hands out strictly increasing sample times for one task, even when the
/// wall clock stalls or steps backwards.
#[derive(Debug, Default)]
pub struct SampleClock {
    last: Option<SystemTime>,
}

impl SampleClock {
    const STEP: Duration = Duration::from_micros(1);

    pub fn next(&mut self) -> SystemTime {
        self.next_after(SystemTime::now())
    }

    pub fn next_after(&mut self, now: SystemTime) -> SystemTime {
        let stamp = match self.last {
            Some(prev) if now <= prev => prev + Self::STEP,
            _ => now,
        };
        self.last = Some(stamp);
        stamp
    }
}

/// Collaborators a polling task talks to.
#[derive(Clone)]
pub struct PollContext {
    pub analog: Arc<dyn AnalogInput>,
    pub stats: Arc<dyn Stats>,
    pub telemetry: Arc<dyn Telemetry>,
    /// Synthesize readings instead of touching the analog driver.
    pub dev_mode: bool,
}

impl PollContext {
    pub fn read(&self, probe: &Probe) -> Result<f64, BoxError> {
        if self.dev_mode {
            let v: f64 = rand::rng().random_range(8.0..10.0);
            return Ok((v * 100.0).round() / 100.0);
        }
        self.analog.read(&probe.analog_input)
    }

    /// One timer tick: read, alert, record.
    fn sample(&self, probe: &Probe, clock: &mut SampleClock) {
        let reading = match self.read(probe) {
            Ok(v) => v,
            Err(e) => {
                warn!(probe = %probe.name, error = %e, "failed to read probe");
                self.telemetry.log_error(
                    &probe.error_tag(),
                    &format!("ph subsystem: failed to read probe {}: {e}", probe.name),
                );
                return;
            }
        };
        debug!(probe = %probe.name, reading, "probe reading");
        self.notify_if_needed(probe, reading);
        self.stats
            .update(&probe.id, Measurement::sample_at(reading, clock.next()));
        self.telemetry.emit_metric("ph", &probe.name, reading);
    }

    fn notify_if_needed(&self, probe: &Probe, reading: f64) {
        let n = &probe.notify;
        if !n.enable || (n.min..=n.max).contains(&reading) {
            return;
        }
        let subject = format!("[reef] ph of '{}' out of range", probe.name);
        let body = format!(
            "Current ph value of probe '{}' ({reading:.2}) is outside the acceptable range ({:.2} - {:.2})",
            probe.name, n.min, n.max
        );
        info!(probe = %probe.name, reading, min = n.min, max = n.max, "ph alert");
        self.telemetry.alert(&subject, &body);
    }
}

/// Owner side of a running polling task.
pub struct PollHandle {
    quit: Option<xch::Sender<()>>,
    status: TaskStatus,
    join_handle: Option<JoinHandle<()>>,
}

impl PollHandle {
    /// Spawn the polling thread for `probe`. The probe is a snapshot; later
    /// edits replace the task instead of reaching into it.
    pub fn spawn(
        probe: Probe,
        ctx: Arc<PollContext>,
        ticks: &dyn TickSource,
    ) -> std::io::Result<Self> {
        let (quit_tx, quit_rx) = xch::bounded::<()>(0);
        let status = TaskStatus::new();
        let status_clone = status.clone();
        let ticker = probe.period_duration().map(|p| ticks.ticks(p));

        let join_handle = std::thread::Builder::new()
            .name(format!("ph-{}", probe.id))
            .spawn(move || poll_loop(&probe, &ctx, ticker, &quit_rx, &status_clone))?;

        Ok(Self {
            quit: Some(quit_tx),
            status,
            join_handle: Some(join_handle),
        })
    }

    /// Signal the task to stop. Non-blocking and idempotent.
    pub fn cancel(&mut self) {
        // Dropping the sender disconnects the channel, which wakes the select.
        self.quit.take();
    }

    pub fn status(&self) -> TaskStatus {
        self.status.clone()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel();
        // A task blocked inside a driver read finishes that read first.
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => trace!("poll thread joined"),
                Err(e) => warn!(?e, "poll thread panicked during shutdown"),
            }
        }
    }
}

fn poll_loop(
    probe: &Probe,
    ctx: &PollContext,
    ticker: Option<xch::Receiver<Instant>>,
    quit: &xch::Receiver<()>,
    status: &TaskStatus,
) {
    let Some(ticker) = ticker else {
        error!(probe = %probe.name, period = probe.period, "invalid period for probe, expected positive");
        status.set(PollState::Stopped);
        return;
    };

    ctx.telemetry.create_feed_if_not_exist(&probe.feed_name());
    status.set(PollState::Running);
    debug!(probe = %probe.name, id = %probe.id, "poll task started");
    let mut clock = SampleClock::default();

    loop {
        xch::select! {
            recv(ticker) -> tick => {
                if tick.is_err() {
                    // Timer source went away; cancellation is still the only exit.
                    warn!(probe = %probe.name, "poll timer closed, waiting for cancellation");
                    let _ = quit.recv();
                    break;
                }
                ctx.sample(probe, &mut clock);
            }
            recv(quit) -> _ => break,
        }
    }

    drop(ticker);
    status.set(PollState::Stopped);
    debug!(probe = %probe.name, id = %probe.id, "poll task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_clock_is_strictly_increasing() {
        let mut clock = SampleClock::default();
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let a = clock.next_after(t0);
        let b = clock.next_after(t0);
        let c = clock.next_after(t0 - Duration::from_secs(5));
        let d = clock.next_after(t0 + Duration::from_secs(1));
        assert_eq!(a, t0);
        assert!(a < b && b < c && c < d);
        assert_eq!(d, t0 + Duration::from_secs(1));
    }

    #[test]
    fn task_status_starts_idle() {
        let status = TaskStatus::new();
        assert_eq!(status.get(), PollState::Idle);
        status.set(PollState::Running);
        assert_eq!(status.clone().get(), PollState::Running);
    }
}
