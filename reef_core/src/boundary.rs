//! Maps `BoxError` values from the collaborator traits to `ControllerError`.
//!
//! The traits in `reef_traits` use `Box<dyn Error + Send + Sync>` so adapters
//! can surface whatever they like; the controllers only deal in typed errors.
//! With `hardware-errors` enabled, `reef_hardware::error::HwError` values are
//! downcast so misconfiguration is reported as a validation error.

use crate::error::ControllerError;
use reef_traits::BoxError;

pub fn store(e: BoxError) -> ControllerError {
    ControllerError::Store(e.to_string())
}

pub fn scheduler(e: BoxError) -> ControllerError {
    ControllerError::Scheduler(e.to_string())
}

pub fn hardware(e: &(dyn std::error::Error + 'static)) -> ControllerError {
    #[cfg(feature = "hardware-errors")]
    {
        use reef_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::UnknownChannel(_) | HwError::InvalidPin(_) | HwError::Duty(_) => {
                    ControllerError::Validation(hw.to_string())
                }
                other => ControllerError::Hardware(other.to_string()),
            };
        }
    }
    ControllerError::Hardware(e.to_string())
}
