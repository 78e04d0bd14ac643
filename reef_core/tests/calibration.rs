use std::sync::Arc;
use std::time::{Duration, Instant};

use reef_core::mocks::{
    ManualScheduler, ManualTicks, MemoryStore, RecordingActuator, RecordingCalibrator,
    RecordingStats, RecordingTelemetry, ScriptedAnalog,
};
use reef_core::{
    CalibrationPoint, ControllerError, Probe, ProbeCalibration, ProbeController, ProbeRuntime,
    Pump, PumpCalibration, PumpController, PumpRuntime, PumpSettings,
};
use reef_traits::clock::ManualClock;
use rstest::rstest;

fn probes(calibrator: Arc<RecordingCalibrator>) -> ProbeController {
    let runtime = ProbeRuntime::new(
        Arc::new(ScriptedAnalog::new(8.0)),
        Arc::new(RecordingStats::new()),
        Arc::new(RecordingTelemetry::new()),
    )
    .with_ticks(Arc::new(ManualTicks::new()))
    .with_calibrator(calibrator);
    ProbeController::new(Arc::new(MemoryStore::new()), runtime)
}

fn probe(enable: bool) -> Probe {
    Probe {
        name: "sump".into(),
        enable,
        period: 30,
        analog_input: "ain0".into(),
        ..Probe::default()
    }
}

fn mid(value: f64) -> ProbeCalibration {
    ProbeCalibration {
        value,
        point: CalibrationPoint::Mid,
    }
}

#[test]
fn enabled_probe_refuses_calibration() {
    let calibrator = Arc::new(RecordingCalibrator::new());
    let ctl = probes(calibrator.clone());
    let id = ctl.create(probe(true)).expect("create");

    let err = ctl.calibrate(&id, mid(7.0)).unwrap_err();
    assert!(
        matches!(err, ControllerError::Validation(ref m) if m.contains("disabled")),
        "{err:?}"
    );
    assert!(calibrator.calls().is_empty());
}

#[rstest]
#[case(CalibrationPoint::High, 10.0)]
#[case(CalibrationPoint::Mid, 7.0)]
#[case(CalibrationPoint::Low, 4.0)]
#[case(CalibrationPoint::Mid, 14.0)]
fn disabled_probe_calibrates(#[case] point: CalibrationPoint, #[case] value: f64) {
    let calibrator = Arc::new(RecordingCalibrator::new());
    let ctl = probes(calibrator.clone());
    let id = ctl.create(probe(false)).expect("create");

    ctl.calibrate(&id, ProbeCalibration { value, point })
        .expect("calibrate");
    assert_eq!(calibrator.calls(), vec![(id, point, value)]);
}

#[rstest]
#[case(0.0)]
#[case(-1.0)]
#[case(14.01)]
#[case(f64::NAN)]
fn out_of_range_value_is_rejected(#[case] value: f64) {
    let calibrator = Arc::new(RecordingCalibrator::new());
    let ctl = probes(calibrator.clone());
    let id = ctl.create(probe(false)).expect("create");

    let err = ctl.calibrate(&id, mid(value)).unwrap_err();
    assert!(matches!(err, ControllerError::Validation(_)), "{err:?}");
    assert!(calibrator.calls().is_empty());
}

#[test]
fn calibrating_unknown_probe_is_not_found() {
    let ctl = probes(Arc::new(RecordingCalibrator::new()));
    assert!(ctl.calibrate("77", mid(7.0)).unwrap_err().is_not_found());
}

#[test]
fn calibration_request_decodes_from_json() {
    let cal: ProbeCalibration =
        serde_json::from_str(r#"{"value": 4.01, "type": "low"}"#).expect("decode");
    assert_eq!(
        cal,
        ProbeCalibration {
            value: 4.01,
            point: CalibrationPoint::Low
        }
    );
    let unknown = serde_json::from_str::<ProbeCalibration>(r#"{"value": 4.0, "type": "neutral"}"#);
    assert!(unknown.is_err());
}

struct PumpRig {
    scheduler: Arc<ManualScheduler>,
    actuator: Arc<RecordingActuator>,
    clock: Arc<ManualClock>,
    ctl: PumpController,
}

fn pumps() -> PumpRig {
    let scheduler = Arc::new(ManualScheduler::new());
    let actuator = Arc::new(RecordingActuator::new());
    let clock = Arc::new(ManualClock::new());
    let runtime = PumpRuntime::new(scheduler.clone(), actuator.clone())
        .with_clock(clock.clone())
        .with_settings(PumpSettings {
            max_speed: 80.0,
            max_calibration_secs: 60,
        });
    PumpRig {
        scheduler,
        actuator,
        clock,
        ctl: PumpController::new(Arc::new(MemoryStore::new()), runtime),
    }
}

fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}

#[test]
fn pump_calibration_runs_detached() {
    let r = pumps();
    let id = r
        .ctl
        .create(Pump {
            name: "kalk".into(),
            pin: "18".into(),
            ..Pump::default()
        })
        .expect("create");
    let before = r.ctl.get(&id).expect("get");

    r.ctl
        .calibrate(
            &id,
            PumpCalibration {
                duration: 30,
                speed: 50.0,
            },
        )
        .expect("calibrate");

    assert!(wait_until(|| r.actuator.writes().len() == 2));
    assert_eq!(
        r.actuator.writes(),
        vec![("18".to_string(), 50.0), ("18".to_string(), 0.0)]
    );
    assert_eq!(r.clock.elapsed(), Duration::from_secs(30));
    assert_eq!(r.ctl.get(&id).expect("get"), before);
    assert!(r.scheduler.is_empty());
}

#[rstest]
#[case(0, 50.0)]
#[case(61, 50.0)]
#[case(30, 0.0)]
#[case(30, -5.0)]
#[case(30, 80.5)]
#[case(30, f64::NAN)]
fn pump_calibration_parameters_are_bounded(#[case] duration: u64, #[case] speed: f64) {
    let r = pumps();
    let id = r
        .ctl
        .create(Pump {
            name: "kalk".into(),
            pin: "18".into(),
            ..Pump::default()
        })
        .expect("create");

    let err = r
        .ctl
        .calibrate(&id, PumpCalibration { duration, speed })
        .unwrap_err();
    assert!(matches!(err, ControllerError::Validation(_)), "{err:?}");
    std::thread::sleep(Duration::from_millis(20));
    assert!(r.actuator.writes().is_empty());
}

#[test]
fn calibrating_unknown_pump_is_not_found() {
    let r = pumps();
    let err = r
        .ctl
        .calibrate(
            "3",
            PumpCalibration {
                duration: 10,
                speed: 20.0,
            },
        )
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(r.actuator.writes().is_empty());
}
