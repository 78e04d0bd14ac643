//! Timer sources for polling tasks.
use crossbeam_channel as xch;
use std::time::{Duration, Instant};

/// Produces a channel that yields one message per polling period.
///
/// Polling tasks own the receiver; dropping it stops the timer.
pub trait TickSource: Send + Sync {
    fn ticks(&self, period: Duration) -> xch::Receiver<Instant>;
}

/// Wall-clock ticks backed by `crossbeam_channel::tick`.
#[derive(Debug, Default, Clone, Copy)]
pub struct IntervalTicks;

impl TickSource for IntervalTicks {
    fn ticks(&self, period: Duration) -> xch::Receiver<Instant> {
        xch::tick(period)
    }
}
