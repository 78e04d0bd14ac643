use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("invalid pin: {0}")]
    InvalidPin(String),
    #[error("unknown analog channel: {0}")]
    UnknownChannel(String),
    #[error("duty cycle {0} outside 0..=100")]
    Duty(f64),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
