//! Hardware drivers for the reef controllers.
//!
//! Simulated drivers are always available; the GPIO PWM pump driver is
//! behind the `hardware` feature.
pub mod error;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod pwm;

use crate::error::HwError;
use reef_traits::{Actuator, AnalogInput, BoxError};
use std::collections::HashMap;
use std::sync::Mutex;

/// Simulated analog front-end: every channel reports a fixed value until
/// changed with `set`. Reading an unregistered channel fails.
#[derive(Debug, Default)]
pub struct SimulatedAnalog {
    channels: Mutex<HashMap<String, f64>>,
}

impl SimulatedAnalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channel(self, channel: &str, value: f64) -> Self {
        self.set(channel, value);
        self
    }

    pub fn set(&self, channel: &str, value: f64) {
        if let Ok(mut ch) = self.channels.lock() {
            ch.insert(channel.to_string(), value);
        }
    }
}

impl AnalogInput for SimulatedAnalog {
    fn read(&self, channel: &str) -> Result<f64, BoxError> {
        let ch = self
            .channels
            .lock()
            .map_err(|_| HwError::Gpio("analog state poisoned".into()))?;
        match ch.get(channel) {
            Some(v) => {
                tracing::trace!(channel, value = *v, "simulated analog read");
                Ok(*v)
            }
            None => Err(Box::new(HwError::UnknownChannel(channel.to_string()))),
        }
    }
}

/// Simulated variable-voltage outputs. Remembers the last duty per pin.
#[derive(Debug, Default)]
pub struct SimulatedPump {
    levels: Mutex<HashMap<String, f64>>,
}

impl SimulatedPump {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last duty written to `pin`, if any.
    pub fn level(&self, pin: &str) -> Option<f64> {
        self.levels.lock().ok().and_then(|l| l.get(pin).copied())
    }
}

impl Actuator for SimulatedPump {
    fn set(&self, pin: &str, value: f64) -> Result<(), BoxError> {
        if !(0.0..=100.0).contains(&value) {
            return Err(Box::new(HwError::Duty(value)));
        }
        let mut levels = self
            .levels
            .lock()
            .map_err(|_| HwError::Gpio("pump state poisoned".into()))?;
        levels.insert(pin.to_string(), value);
        tracing::debug!(pin, duty = value, "simulated pump output");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn simulated_analog_reports_configured_value() {
        let analog = SimulatedAnalog::new().with_channel("ph-1", 8.21);
        assert_eq!(analog.read("ph-1").unwrap(), 8.21);
        analog.set("ph-1", 7.9);
        assert_eq!(analog.read("ph-1").unwrap(), 7.9);
    }

    #[test]
    fn simulated_analog_rejects_unknown_channel() {
        let analog = SimulatedAnalog::new();
        let err = analog.read("nope").unwrap_err();
        assert!(err.to_string().contains("unknown analog channel"));
    }

    #[rstest]
    #[case(0.0)]
    #[case(42.5)]
    #[case(100.0)]
    fn simulated_pump_accepts_duty_in_range(#[case] duty: f64) {
        let pump = SimulatedPump::new();
        pump.set("pump-a", duty).unwrap();
        assert_eq!(pump.level("pump-a"), Some(duty));
    }

    #[rstest]
    #[case(-1.0)]
    #[case(100.5)]
    fn simulated_pump_rejects_duty_out_of_range(#[case] duty: f64) {
        let pump = SimulatedPump::new();
        assert!(pump.set("pump-a", duty).is_err());
        assert_eq!(pump.level("pump-a"), None);
    }
}
