// Configuration error types and constants

use crate::error::ErrorCode;
use crate::reading::SensorKind;
use log::error;
use std::fmt;

/// Config error code constants
///
/// Error code range: 3001-3005
pub struct ConfigErrorCodes {}

impl ConfigErrorCodes {
    /// A calibration profile violates its invariants
    pub const INVALID_PROFILE: i32 = 3001;

    /// A status scale is empty or not strictly ascending
    pub const INVALID_SCALE: i32 = 3002;

    /// Config file could not be read or parsed
    pub const IO: i32 = 3003;

    /// Poll cadence is unusable
    pub const INVALID_POLL: i32 = 3004;

    /// Pin mapping cannot be addressed on the board
    pub const INVALID_PINS: i32 = 3005;
}

/// Log a config error with structured context
pub fn log_config_error(err: &ConfigError, context: &str) {
    error!(
        "Config error in {}: code={}, component=AppConfig, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Startup configuration errors
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Calibration constants for one sensor kind are unusable
    InvalidProfile { kind: SensorKind, reason: String },

    /// Status thresholds are malformed
    InvalidScale { reason: String },

    /// Reading or parsing the config source failed
    Io { reason: String },

    /// Poll settings out of range
    InvalidPoll { reason: String },

    /// Pin mapping out of range
    InvalidPins { reason: String },
}

impl ErrorCode for ConfigError {
    fn code(&self) -> i32 {
        match self {
            ConfigError::InvalidProfile { .. } => ConfigErrorCodes::INVALID_PROFILE,
            ConfigError::InvalidScale { .. } => ConfigErrorCodes::INVALID_SCALE,
            ConfigError::Io { .. } => ConfigErrorCodes::IO,
            ConfigError::InvalidPoll { .. } => ConfigErrorCodes::INVALID_POLL,
            ConfigError::InvalidPins { .. } => ConfigErrorCodes::INVALID_PINS,
        }
    }

    fn message(&self) -> String {
        match self {
            ConfigError::InvalidProfile { kind, reason } => {
                format!("Invalid calibration profile for {}: {}", kind, reason)
            }
            ConfigError::InvalidScale { reason } => format!("Invalid status scale: {}", reason),
            ConfigError::Io { reason } => format!("Failed to load configuration: {}", reason),
            ConfigError::InvalidPoll { reason } => format!("Invalid poll settings: {}", reason),
            ConfigError::InvalidPins { reason } => format!("Invalid pin mapping: {}", reason),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ConfigError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io {
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Io {
            reason: err.to_string(),
        }
    }
}
