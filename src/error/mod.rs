// Error types for the field logger
//
// This module defines custom error types for the sensor transport, the
// reading store and configuration, each carrying a stable numeric code so
// reports surfaced to the dashboard can be keyed without string matching.

mod config;
mod sensor;
mod storage;

pub use config::{log_config_error, ConfigError, ConfigErrorCodes};
pub use sensor::{log_sensor_error, SensorError, SensorErrorCodes};
pub use storage::{log_storage_error, StorageError, StorageErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the presentation boundary.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
