//! Polling task behaviour: sampling, failure reporting, alerts.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reef_core::mocks::{
    ManualTicks, MemoryStore, RecordingStats, RecordingTelemetry, ScriptedAnalog,
};
use reef_core::poller::{PollContext, PollHandle};
use reef_core::{
    IntervalTicks, Notify, PollState, Probe, ProbeController, ProbeRuntime, ProbeSettings,
};

fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}

fn probe(id: &str, period: i64) -> Probe {
    Probe {
        id: id.into(),
        name: format!("probe-{id}"),
        enable: true,
        period,
        analog_input: "ain1".into(),
        ..Probe::default()
    }
}

fn context(
    analog: Arc<ScriptedAnalog>,
    stats: Arc<RecordingStats>,
    telemetry: Arc<RecordingTelemetry>,
) -> Arc<PollContext> {
    Arc::new(PollContext {
        analog,
        stats,
        telemetry,
        dev_mode: false,
    })
}

#[test]
fn read_failures_are_reported_and_polling_continues() {
    let analog = Arc::new(
        ScriptedAnalog::new(7.9)
            .then_err("adc timeout")
            .then_err("adc timeout")
            .then_err("adc timeout"),
    );
    let stats = Arc::new(RecordingStats::new());
    let telemetry = Arc::new(RecordingTelemetry::new());
    let ticks = ManualTicks::new();
    let p = probe("7", 10);

    let mut handle = PollHandle::spawn(
        p.clone(),
        context(analog.clone(), stats.clone(), telemetry.clone()),
        &ticks,
    )
    .expect("spawn");

    for _ in 0..3 {
        assert!(ticks.tick(0));
    }
    assert!(wait_until(|| telemetry.errors().len() == 3));
    assert_eq!(handle.status().get(), PollState::Running);
    assert!(stats.updates().is_empty());
    for (tag, msg) in telemetry.errors() {
        assert_eq!(tag, "ph-7");
        assert!(msg.contains("probe-7"), "{msg}");
        assert!(msg.contains("adc timeout"), "{msg}");
    }

    // The fourth read succeeds.
    assert!(ticks.tick(0));
    assert!(wait_until(|| telemetry.metrics().len() == 1));
    assert_eq!(stats.updates_for("7")[0].value, 7.9);
    assert_eq!(analog.reads(), 4);

    let status = handle.status();
    handle.cancel();
    drop(handle);
    assert_eq!(status.get(), PollState::Stopped);
}

#[test]
fn out_of_range_readings_raise_alerts() {
    let analog = Arc::new(
        ScriptedAnalog::new(8.1)
            .then_ok(8.0)
            .then_ok(8.6)
            .then_ok(7.5),
    );
    let stats = Arc::new(RecordingStats::new());
    let telemetry = Arc::new(RecordingTelemetry::new());
    let ticks = ManualTicks::new();
    let mut p = probe("3", 60);
    p.name = "main".into();
    p.notify = Notify {
        enable: true,
        min: 7.8,
        max: 8.4,
    };

    let handle = PollHandle::spawn(p, context(analog, stats.clone(), telemetry.clone()), &ticks)
        .expect("spawn");
    for _ in 0..3 {
        assert!(ticks.tick(0));
    }
    assert!(wait_until(|| telemetry.metrics().len() == 3));
    drop(handle);

    let alerts = telemetry.alerts();
    assert_eq!(alerts.len(), 2);
    assert!(
        alerts
            .iter()
            .all(|(subject, _)| subject == "[reef] ph of 'main' out of range")
    );
    assert!(alerts[0].1.contains("8.60"));
    assert!(alerts[1].1.contains("7.50"));
    assert!(alerts[1].1.contains("7.80 - 8.40"));
    // Alerting never suppresses recording.
    assert_eq!(stats.updates_for("3").len(), 3);
}

#[test]
fn disabled_notify_never_alerts() {
    let analog = Arc::new(ScriptedAnalog::new(12.0));
    let telemetry = Arc::new(RecordingTelemetry::new());
    let ticks = ManualTicks::new();
    let mut p = probe("4", 60);
    p.notify = Notify {
        enable: false,
        min: 7.8,
        max: 8.4,
    };

    let handle = PollHandle::spawn(
        p,
        context(analog, Arc::new(RecordingStats::new()), telemetry.clone()),
        &ticks,
    )
    .expect("spawn");
    assert!(ticks.tick(0));
    assert!(wait_until(|| telemetry.metrics().len() == 1));
    drop(handle);

    assert!(telemetry.alerts().is_empty());
}

#[test]
fn invalid_period_stops_without_sampling() {
    let telemetry = Arc::new(RecordingTelemetry::new());
    let ticks = ManualTicks::new();

    let handle = PollHandle::spawn(
        probe("5", 0),
        context(
            Arc::new(ScriptedAnalog::new(8.0)),
            Arc::new(RecordingStats::new()),
            telemetry.clone(),
        ),
        &ticks,
    )
    .expect("spawn");

    let status = handle.status();
    assert!(wait_until(|| status.get() == PollState::Stopped));
    assert_eq!(ticks.opened(), 0);
    assert!(telemetry.feeds().is_empty());
    drop(handle);
}

#[test]
fn closed_timer_waits_for_cancellation() {
    let ticks = ManualTicks::new();
    let telemetry = Arc::new(RecordingTelemetry::new());
    let handle = PollHandle::spawn(
        probe("6", 5),
        context(
            Arc::new(ScriptedAnalog::new(8.0)),
            Arc::new(RecordingStats::new()),
            telemetry.clone(),
        ),
        &ticks,
    )
    .expect("spawn");
    let status = handle.status();
    assert!(wait_until(|| status.get() == PollState::Running));

    drop(ticks);
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(status.get(), PollState::Running);

    drop(handle);
    assert_eq!(status.get(), PollState::Stopped);
    assert!(telemetry.metrics().is_empty());
}

#[test]
fn dropping_many_handles_leaves_no_running_tasks() {
    let ticks = ManualTicks::new();
    let ctx = context(
        Arc::new(ScriptedAnalog::new(8.0)),
        Arc::new(RecordingStats::new()),
        Arc::new(RecordingTelemetry::new()),
    );
    let mut statuses = Vec::new();
    for i in 0..10 {
        let handle =
            PollHandle::spawn(probe(&i.to_string(), 1), Arc::clone(&ctx), &ticks).expect("spawn");
        statuses.push(handle.status());
        drop(handle);
    }
    assert!(statuses.iter().all(|s| s.get() == PollState::Stopped));
    assert!((0..ticks.opened()).all(|i| !ticks.tick(i)));
}

#[test]
fn interval_ticks_drive_real_sampling() {
    let stats = Arc::new(RecordingStats::new());
    let handle = PollHandle::spawn(
        probe("8", 1),
        context(
            Arc::new(ScriptedAnalog::new(8.2)),
            stats.clone(),
            Arc::new(RecordingTelemetry::new()),
        ),
        &IntervalTicks,
    )
    .expect("spawn");

    assert!(wait_until(|| !stats.updates_for("8").is_empty()));
    drop(handle);
}

#[test]
fn dev_mode_synthesizes_readings() {
    let analog = Arc::new(ScriptedAnalog::new(0.0).then_err("not wired"));
    let runtime = ProbeRuntime::new(
        analog.clone(),
        Arc::new(RecordingStats::new()),
        Arc::new(RecordingTelemetry::new()),
    )
    .with_settings(ProbeSettings {
        dev_mode: true,
        ..ProbeSettings::default()
    });
    let ctl = ProbeController::new(Arc::new(MemoryStore::new()), runtime);

    for _ in 0..50 {
        let v = ctl.read(&probe("9", 10)).expect("read");
        assert!((8.0..=10.0).contains(&v), "{v}");
        assert!(((v * 100.0).round() - v * 100.0).abs() < 1e-6, "{v}");
    }
    assert_eq!(analog.reads(), 0);
}

#[test]
fn one_off_read_uses_the_probe_channel() {
    let analog = Arc::new(ScriptedAnalog::new(8.3).then_err("adc busy"));
    let ctl = ProbeController::new(
        Arc::new(MemoryStore::new()),
        ProbeRuntime::new(
            analog.clone(),
            Arc::new(RecordingStats::new()),
            Arc::new(RecordingTelemetry::new()),
        ),
    );

    let err = ctl.read(&probe("10", 10)).unwrap_err();
    assert!(err.to_string().contains("adc busy"), "{err}");
    assert_eq!(ctl.read(&probe("10", 10)).expect("read"), 8.3);
    assert_eq!(analog.reads(), 2);
}
