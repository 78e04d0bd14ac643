//! Controllers wired to the simulated drivers from `reef_hardware`.
#![cfg(feature = "hardware-errors")]

use std::sync::Arc;
use std::time::{Duration, Instant};

use reef_core::mocks::{ManualScheduler, MemoryStore, RecordingStats, RecordingTelemetry};
use reef_core::{
    ControllerError, Probe, ProbeController, ProbeRuntime, Pump, PumpCalibration, PumpController,
    PumpRuntime,
};
use reef_hardware::{SimulatedAnalog, SimulatedPump};
use reef_traits::clock::ManualClock;

fn probe_on(channel: &str) -> Probe {
    Probe {
        name: "sump".into(),
        period: 10,
        analog_input: channel.into(),
        ..Probe::default()
    }
}

#[test]
fn unknown_analog_channel_is_a_validation_error() {
    let analog = Arc::new(SimulatedAnalog::new().with_channel("ain0", 8.25));
    let ctl = ProbeController::new(
        Arc::new(MemoryStore::new()),
        ProbeRuntime::new(
            analog.clone(),
            Arc::new(RecordingStats::new()),
            Arc::new(RecordingTelemetry::new()),
        ),
    );

    assert_eq!(ctl.read(&probe_on("ain0")).expect("read"), 8.25);
    let err = ctl.read(&probe_on("ain7")).unwrap_err();
    assert!(
        matches!(err, ControllerError::Validation(ref m) if m.contains("ain7")),
        "{err:?}"
    );

    analog.set("ain0", 7.9);
    assert_eq!(ctl.read(&probe_on("ain0")).expect("read"), 7.9);
}

#[test]
fn calibration_run_drives_simulated_pump() {
    let pump = Arc::new(SimulatedPump::new());
    let ctl = PumpController::new(
        Arc::new(MemoryStore::new()),
        PumpRuntime::new(Arc::new(ManualScheduler::new()), pump.clone())
            .with_clock(Arc::new(ManualClock::new())),
    );
    let id = ctl
        .create(Pump {
            name: "kalk".into(),
            pin: "pwm0".into(),
            ..Pump::default()
        })
        .expect("create");

    ctl.calibrate(
        &id,
        PumpCalibration {
            duration: 2,
            speed: 40.0,
        },
    )
    .expect("calibrate");

    // The run is detached; it ends with the pump switched off.
    let deadline = Instant::now() + Duration::from_secs(2);
    while pump.level("pwm0") != Some(0.0) && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(pump.level("pwm0"), Some(0.0));
}
