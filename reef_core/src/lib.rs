#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Device controllers for pH probes and dosing pumps (hardware-agnostic).
//!
//! Every collaborator is reached through the traits in `reef_traits`: the
//! record store, the cron scheduler, stats, telemetry and the drivers.
//!
//! ## Architecture
//!
//! - **Controller**: generic CRUD plus the live-work registry (`controller`)
//! - **Devices**: `Probe` (`probe`) and `Pump` (`pump`) records and their launchers
//! - **Polling**: one cancellable thread per enabled probe (`poller`)
//! - **Dosing**: bounded dispense runs, scheduled or one-off (`dispense`)
//! - **Schedules**: cron expression validation (`schedule`)
//!
//! ## Invariant
//!
//! Whenever a controller's lock is released, each enabled record has exactly
//! one registered piece of work and every other record has none.

pub mod boundary;
pub mod config;
pub mod controller;
pub mod conversions;
pub mod device;
pub mod dispense;
pub mod error;
pub mod mocks;
pub mod poller;
pub mod probe;
pub mod pump;
pub mod registry;
pub mod schedule;
pub mod ticks;

pub use config::{ProbeSettings, PumpSettings};
pub use controller::Controller;
pub use device::{Device, Launcher};
pub use error::{ControllerError, Result};
pub use poller::{PollState, TaskStatus};
pub use probe::{
    CalibrationPoint, Calibrator, NoopCalibrator, Notify, Probe, ProbeCalibration,
    ProbeController, ProbeRuntime,
};
pub use pump::{DosingRegimen, Pump, PumpCalibration, PumpController, PumpRuntime};
pub use schedule::CronSpec;
pub use ticks::{IntervalTicks, TickSource};
