// Sensor transport error types and constants

use crate::error::ErrorCode;
use crate::reading::SensorKind;
use log::error;
use std::fmt;

/// Sensor error code constants
///
/// Error code range: 1001-1005
pub struct SensorErrorCodes {}

impl SensorErrorCodes {
    /// Serial port could not be opened
    pub const PORT_OPEN_FAILED: i32 = 1001;

    /// Read attempted before the board was initialized (or after close)
    pub const NOT_INITIALIZED: i32 = 1002;

    /// Link to the board failed mid-read
    pub const TRANSPORT: i32 = 1003;

    /// A sensor kind was requested that has no pin assigned
    pub const UNKNOWN_PIN: i32 = 1004;

    /// Board sent bytes that do not decode as expected
    pub const PROTOCOL: i32 = 1005;
}

/// Log a sensor error with structured context
///
/// Mirrors the storage and config helpers: error code, component and
/// message in one line so log scrapers can key on `code=`.
pub fn log_sensor_error(err: &SensorError, context: &str) {
    error!(
        "Sensor error in {}: code={}, component=SensorSource, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Sensor transport errors
///
/// An absent reading is NOT an error; these variants mean the hardware
/// link itself is unusable for the current cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorError {
    /// Failed to open the serial port
    PortOpenFailed { port: String, reason: String },

    /// Board handle is not initialized
    NotInitialized,

    /// I/O failure on an open link
    Transport { details: String },

    /// Requested sensor kind has no pin configured
    UnknownPin { kind: SensorKind },

    /// Malformed data from the board
    Protocol { details: String },
}

impl ErrorCode for SensorError {
    fn code(&self) -> i32 {
        match self {
            SensorError::PortOpenFailed { .. } => SensorErrorCodes::PORT_OPEN_FAILED,
            SensorError::NotInitialized => SensorErrorCodes::NOT_INITIALIZED,
            SensorError::Transport { .. } => SensorErrorCodes::TRANSPORT,
            SensorError::UnknownPin { .. } => SensorErrorCodes::UNKNOWN_PIN,
            SensorError::Protocol { .. } => SensorErrorCodes::PROTOCOL,
        }
    }

    fn message(&self) -> String {
        match self {
            SensorError::PortOpenFailed { port, reason } => {
                format!("Failed to open board on {}: {}", port, reason)
            }
            SensorError::NotInitialized => {
                "Board not initialized. Call initialize() first.".to_string()
            }
            SensorError::Transport { details } => format!("Transport error: {}", details),
            SensorError::UnknownPin { kind } => {
                format!("No pin configured for {}", kind)
            }
            SensorError::Protocol { details } => format!("Protocol error: {}", details),
        }
    }
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SensorError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for SensorError {}

impl From<std::io::Error> for SensorError {
    fn from(err: std::io::Error) -> Self {
        SensorError::Transport {
            details: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensor_error_codes() {
        assert_eq!(
            SensorError::PortOpenFailed {
                port: "COM6".to_string(),
                reason: "busy".to_string()
            }
            .code(),
            SensorErrorCodes::PORT_OPEN_FAILED
        );
        assert_eq!(
            SensorError::NotInitialized.code(),
            SensorErrorCodes::NOT_INITIALIZED
        );
        assert_eq!(
            SensorError::Transport {
                details: "test".to_string()
            }
            .code(),
            SensorErrorCodes::TRANSPORT
        );
        assert_eq!(
            SensorError::UnknownPin {
                kind: SensorKind::AirLight
            }
            .code(),
            SensorErrorCodes::UNKNOWN_PIN
        );
        assert_eq!(
            SensorError::Protocol {
                details: "test".to_string()
            }
            .code(),
            SensorErrorCodes::PROTOCOL
        );
    }

    #[test]
    fn test_sensor_error_messages() {
        let err = SensorError::PortOpenFailed {
            port: "/dev/ttyACM0".to_string(),
            reason: "permission denied".to_string(),
        };
        assert_eq!(
            err.message(),
            "Failed to open board on /dev/ttyACM0: permission denied"
        );

        let err = SensorError::UnknownPin {
            kind: SensorKind::SoilMoisture,
        };
        assert!(err.message().contains("soil_moisture"));
    }

    #[test]
    fn test_sensor_error_display() {
        let err = SensorError::NotInitialized;
        let display = format!("{}", err);
        assert!(display.contains("SensorError"));
        assert!(display.contains("1002"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "cable pulled");
        let err: SensorError = io_err.into();
        match err {
            SensorError::Transport { details } => assert!(details.contains("cable pulled")),
            other => panic!("Expected Transport, got {:?}", other),
        }
    }
}
