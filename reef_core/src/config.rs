//! Runtime settings for the device controllers.
//!
//! Separate from the TOML-deserialized config in `reef_config`; see
//! `conversions` for the mapping.

/// pH probe controller settings.
#[derive(Debug, Clone)]
pub struct ProbeSettings {
    /// Synthesize readings in `[8.0, 10.0)` instead of reading the analog driver.
    pub dev_mode: bool,
    /// Calibration values must be strictly above this.
    pub calibration_min: f64,
    /// Calibration values must be at or below this.
    pub calibration_max: f64,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            dev_mode: false,
            calibration_min: 0.0,
            calibration_max: 14.0,
        }
    }
}

/// Dosing pump controller settings.
#[derive(Debug, Clone)]
pub struct PumpSettings {
    /// Calibration speed must be in `(0, max_speed]`.
    pub max_speed: f64,
    /// Calibration duration must be in `[1, max_calibration_secs]`.
    pub max_calibration_secs: u64,
}

impl Default for PumpSettings {
    fn default() -> Self {
        Self {
            max_speed: 100.0,
            max_calibration_secs: 600,
        }
    }
}
