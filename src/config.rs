//! Configuration management for the field logger
//!
//! Runtime configuration is loaded from a JSON file so pin wiring and
//! calibration constants can be changed without recompiling. Calibration
//! constants have been re-tuned several times on real hardware, which is
//! why they live here rather than in code.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::calibration::CalibrationSet;
use crate::error::{log_config_error, ConfigError, ErrorCode};
use crate::sensor::{FirmataSource, SensorPins};
use crate::storage::StorageConfig;

/// Environment variable overriding `board.port`
pub const PORT_ENV: &str = "ARDUINO_PORT";

/// Environment variable overriding `poll.interval_secs`
pub const REFRESH_RATE_ENV: &str = "REFRESH_RATE";

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub board: BoardConfig,
    pub pins: SensorPins,
    pub calibration: CalibrationSet,
    pub storage: StorageConfig,
    pub poll: PollConfig,
}

/// Serial link to the Firmata board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// Serial port identifier (`/dev/ttyACM0`, `COM6`, ...)
    pub port: String,
    /// Firmata's standard rate is 57600
    pub baud_rate: u32,
    /// Wait after opening the port while the board resets
    pub boot_delay_ms: u64,
    /// Wait after enabling analog reporting
    pub settle_delay_ms: u64,
    pub read_timeout_ms: u64,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyACM0".to_string(),
            baud_rate: 57_600,
            boot_delay_ms: 2_000,
            settle_delay_ms: 100,
            read_timeout_ms: 1_000,
        }
    }
}

impl BoardConfig {
    /// Sensor source for this board
    pub fn source(&self) -> FirmataSource {
        FirmataSource {
            baud_rate: self.baud_rate,
            boot_delay: Duration::from_millis(self.boot_delay_ms),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            read_timeout: Duration::from_millis(self.read_timeout_ms),
        }
    }
}

/// Poll cadence and dashboard history window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub interval_secs: u64,
    pub history_hours: i64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            history_hours: 1,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_secs == 0 {
            return Err(ConfigError::InvalidPoll {
                reason: "interval_secs must be at least 1".to_string(),
            });
        }
        if self.history_hours < 0 {
            return Err(ConfigError::InvalidPoll {
                reason: format!("history_hours must not be negative (got {})", self.history_hours),
            });
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// Loaded configuration, or defaults if the file is missing, unparsable
    /// or fails validation (a warning is logged in each case)
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match Self::load_strict(&path) {
            Ok(config) => {
                log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                config
            }
            Err(err) => {
                log::warn!(
                    "[Config] Failed to load {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err.message()
                );
                Self::default()
            }
        }
    }

    /// Load and validate, returning the error instead of falling back
    pub fn load_strict<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Parse and validate a JSON document; missing sections take defaults
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check calibration profiles and poll settings
    ///
    /// # Errors
    /// - `ConfigError::InvalidProfile` / `InvalidScale` from the calibration set
    /// - `ConfigError::InvalidPins` if a pin is not an analog input
    /// - `ConfigError::InvalidPoll` if the interval is zero or the history
    ///   window is negative
    pub fn validate(&self) -> Result<(), ConfigError> {
        let result = self
            .calibration
            .validate()
            .and_then(|()| self.pins.validate())
            .and_then(|()| self.poll.validate());
        if let Err(err) = &result {
            log_config_error(err, "validate");
        }
        result
    }

    /// Apply `ARDUINO_PORT` and `REFRESH_RATE` if set
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(
            std::env::var(PORT_ENV).ok(),
            std::env::var(REFRESH_RATE_ENV).ok(),
        )
    }

    fn with_overrides(mut self, port: Option<String>, refresh_rate: Option<String>) -> Self {
        if let Some(port) = port.filter(|p| !p.trim().is_empty()) {
            log::info!("[Config] {} overrides board port: {}", PORT_ENV, port);
            self.board.port = port;
        }
        if let Some(raw) = refresh_rate {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => self.poll.interval_secs = secs,
                _ => log::warn!("[Config] Ignoring invalid {}={:?}", REFRESH_RATE_ENV, raw),
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.board.baud_rate, 57_600);
        assert_eq!(config.pins.air_light, Some(3));
        assert_eq!(config.poll.interval_secs, 5);
        assert_eq!(config.poll.history_hours, 1);
        assert_eq!(config.calibration.soil_moisture.wet_value, 0.49);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_roundtrip() {
        let config = AppConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed = AppConfig::from_json_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = AppConfig::from_json_str(
            r#"{ "board": { "port": "COM6" }, "pins": { "air_flow": null } }"#,
        )
        .unwrap();

        assert_eq!(config.board.port, "COM6");
        assert_eq!(config.board.baud_rate, 57_600);
        assert_eq!(config.pins.air_flow, None);
        assert_eq!(config.pins.soil_moisture, Some(0));
    }

    #[test]
    fn test_invalid_profile_rejected() {
        let err = AppConfig::from_json_str(
            r#"{ "calibration": { "soil_moisture": { "wet_value": 0.5, "dry_value": 0.5 } } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidProfile { .. }));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let err = AppConfig::from_json_str(r#"{ "poll": { "interval_secs": 0 } }"#).unwrap_err();
        assert_eq!(err.code(), 3004);
        assert!(matches!(err, ConfigError::InvalidPoll { .. }));

        let err = AppConfig::from_json_str(r#"{ "poll": { "history_hours": -1 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPoll { .. }));
    }

    #[test]
    fn test_pin_above_analog_range_rejected() {
        let err = AppConfig::from_json_str(r#"{ "pins": { "air_light": 17 } }"#).unwrap_err();
        match err {
            ConfigError::InvalidPins { reason } => assert!(reason.contains("air_light")),
            other => panic!("Expected InvalidPins, got {:?}", other),
        }
        assert!(AppConfig::from_json_str(r#"{ "pins": { "air_light": 15 } }"#).is_ok());
    }

    #[test]
    fn test_malformed_json_is_io_error() {
        let err = AppConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = AppConfig::load_from_file("/nonexistent/field_logger.json");
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "poll": { "interval_secs": 30 } }"#).unwrap();

        let config = AppConfig::load_from_file(&path);
        assert_eq!(config.poll.interval(), Duration::from_secs(30));
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::default()
            .with_overrides(Some("COM6".to_string()), Some("10".to_string()));
        assert_eq!(config.board.port, "COM6");
        assert_eq!(config.poll.interval_secs, 10);

        let config = AppConfig::default().with_overrides(None, Some("fast".to_string()));
        assert_eq!(config.poll.interval_secs, 5);
    }

    #[test]
    fn test_board_source_uses_timings() {
        let board = BoardConfig {
            settle_delay_ms: 250,
            ..BoardConfig::default()
        };
        let source = board.source();
        assert_eq!(source.settle_delay, Duration::from_millis(250));
        assert_eq!(source.baud_rate, 57_600);
    }
}
