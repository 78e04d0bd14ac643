//! `From` implementations bridging `reef_config` types to `reef_core` settings.

use crate::config::{ProbeSettings, PumpSettings};

// ── ProbeSettings ────────────────────────────────────────────────────────────

impl From<&reef_config::PhCfg> for ProbeSettings {
    fn from(c: &reef_config::PhCfg) -> Self {
        Self {
            dev_mode: c.dev_mode,
            calibration_min: c.calibration_min,
            calibration_max: c.calibration_max,
        }
    }
}

// ── PumpSettings ─────────────────────────────────────────────────────────────

impl From<&reef_config::DoserCfg> for PumpSettings {
    fn from(c: &reef_config::DoserCfg) -> Self {
        Self {
            max_speed: c.max_speed,
            max_calibration_secs: c.max_calibration_secs,
        }
    }
}
