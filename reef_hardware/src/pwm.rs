use std::collections::HashMap;
use std::sync::Mutex;

use reef_traits::{Actuator, BoxError};
use rppal::gpio::{Gpio, OutputPin};
use tracing::{debug, trace};

use crate::error::{HwError, Result};

/// Software PWM frequency used for peristaltic pump drivers.
const PWM_HZ: f64 = 500.0;

/// Drives dosing pumps through software PWM on BCM GPIO pins.
///
/// Pins are named by their BCM number (`"18"`) and opened lazily on first use.
pub struct PwmPump {
    gpio: Gpio,
    pins: Mutex<HashMap<u8, OutputPin>>,
}

impl PwmPump {
    pub fn new() -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        Ok(Self {
            gpio,
            pins: Mutex::new(HashMap::new()),
        })
    }

    fn write(&self, pin: u8, duty: f64) -> Result<()> {
        let mut pins = self
            .pins
            .lock()
            .map_err(|_| HwError::Gpio("pin table poisoned".into()))?;
        if !pins.contains_key(&pin) {
            let out = self
                .gpio
                .get(pin)
                .map_err(|e| HwError::Gpio(e.to_string()))?
                .into_output_low();
            pins.insert(pin, out);
        }
        let Some(out) = pins.get_mut(&pin) else {
            return Err(HwError::InvalidPin(pin.to_string()));
        };
        if duty == 0.0 {
            out.clear_pwm().map_err(|e| HwError::Gpio(e.to_string()))?;
            out.set_low();
        } else {
            out.set_pwm_frequency(PWM_HZ, duty / 100.0)
                .map_err(|e| HwError::Gpio(e.to_string()))?;
        }
        trace!(pin, duty, "pwm duty applied");
        Ok(())
    }
}

impl Actuator for PwmPump {
    fn set(&self, pin: &str, value: f64) -> std::result::Result<(), BoxError> {
        if !(0.0..=100.0).contains(&value) {
            return Err(Box::new(HwError::Duty(value)));
        }
        let bcm: u8 = pin
            .parse()
            .map_err(|_| HwError::InvalidPin(pin.to_string()))?;
        debug!(pin = bcm, duty = value, "pump output");
        self.write(bcm, value)?;
        Ok(())
    }
}
