//! Cron-style time specifications for dosing regimens.
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{ControllerError, Result};

/// A cron expression as entered by the user.
///
/// Accepts the classic five fields (`min hour dom month dow`) as well as the
/// six/seven-field form with leading seconds and optional trailing year.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CronSpec(String);

impl CronSpec {
    pub fn new(spec: impl Into<String>) -> Self {
        Self(spec.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The expression with a seconds field, as the `cron` parser expects.
    fn with_seconds(&self) -> Option<String> {
        let fields = self.0.split_whitespace().count();
        match fields {
            5 => Some(format!("0 {}", self.0.trim())),
            6 | 7 => Some(self.0.trim().to_string()),
            _ => None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let Some(expr) = self.with_seconds() else {
            return Err(ControllerError::Validation(format!(
                "invalid cron spec '{}': expected 5, 6 or 7 fields",
                self.0
            )));
        };
        cron::Schedule::from_str(&expr)
            .map(|_| ())
            .map_err(|e| ControllerError::Validation(format!("invalid cron spec '{}': {e}", self.0)))
    }
}

impl From<&str> for CronSpec {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Display for CronSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
