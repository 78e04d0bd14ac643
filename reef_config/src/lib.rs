#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the reef device controllers.
//!
//! `Config` and its sections are deserialized from TOML and validated.
//! Every field has a default, so an empty document is a valid config.
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PhCfg {
    /// Produce synthetic readings instead of touching the analog driver.
    pub dev_mode: bool,
    /// Lowest accepted calibration value (exclusive).
    pub calibration_min: f64,
    /// Highest accepted calibration value (inclusive).
    pub calibration_max: f64,
}

impl Default for PhCfg {
    fn default() -> Self {
        Self {
            dev_mode: false,
            calibration_min: 0.0,
            calibration_max: 14.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DoserCfg {
    /// Upper bound for pump speed (percent duty) in calibration runs.
    pub max_speed: f64,
    /// Upper bound for a single calibration dispense, in seconds.
    pub max_calibration_secs: u64,
}

impl Default for DoserCfg {
    fn default() -> Self {
        Self {
            max_speed: 100.0,
            max_calibration_secs: 600,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub ph: PhCfg,
    pub doser: DoserCfg,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // pH
        if !self.ph.calibration_min.is_finite() || !self.ph.calibration_max.is_finite() {
            eyre::bail!("ph calibration bounds must be finite");
        }
        if self.ph.calibration_min < 0.0 {
            eyre::bail!("ph.calibration_min must be >= 0");
        }
        if self.ph.calibration_max <= self.ph.calibration_min {
            eyre::bail!("ph.calibration_max must be > ph.calibration_min");
        }
        if self.ph.calibration_max > 14.0 {
            eyre::bail!("ph.calibration_max must be <= 14");
        }

        // Doser
        if !(self.doser.max_speed > 0.0 && self.doser.max_speed <= 100.0) {
            eyre::bail!("doser.max_speed must be in (0, 100]");
        }
        if self.doser.max_calibration_secs == 0 {
            eyre::bail!("doser.max_calibration_secs must be >= 1");
        }
        if self.doser.max_calibration_secs > 24 * 60 * 60 {
            eyre::bail!("doser.max_calibration_secs is unreasonably large (>24h)");
        }

        Ok(())
    }
}
