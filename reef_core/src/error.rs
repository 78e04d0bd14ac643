use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ControllerError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("{bucket} record not found: {id}")]
    NotFound { bucket: &'static str, id: String },
    #[error("store error: {0}")]
    Store(String),
    #[error("scheduler error: {0}")]
    Scheduler(String),
    #[error("codec error: {0}")]
    Codec(String),
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("failed to spawn task: {0}")]
    Spawn(String),
}

impl ControllerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<serde_json::Error> for ControllerError {
    fn from(e: serde_json::Error) -> Self {
        Self::Codec(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ControllerError>;
