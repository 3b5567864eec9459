use std::fmt;
use std::time::Duration;

use crate::platform::AlarmId;

/// Errors reported by the platform services layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// A timer was requested with a zero interval.
    InvalidInterval { interval: Duration },
    /// The host refused to arm a periodic alarm.
    AlarmArm { reason: String },
    /// The host failed to release an alarm.
    AlarmDisarm { alarm: AlarmId, reason: String },
    /// A configuration value is out of range.
    InvalidConfig { field: &'static str, reason: String },
}

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformError::InvalidInterval { interval } => {
                write!(f, "timer interval must be positive, got {interval:?}")
            }
            PlatformError::AlarmArm { reason } => write!(f, "failed to arm alarm: {reason}"),
            PlatformError::AlarmDisarm { alarm, reason } => {
                write!(f, "failed to disarm {alarm}: {reason}")
            }
            PlatformError::InvalidConfig { field, reason } => {
                write!(f, "invalid platform config `{field}`: {reason}")
            }
        }
    }
}

impl std::error::Error for PlatformError {}
