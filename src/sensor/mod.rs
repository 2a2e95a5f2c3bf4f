//! Sensor source boundary - how the poll controller reaches the board
//!
//! The controller owns at most one [`SensorHandle`] at a time. A handle is
//! obtained from [`SensorSource::initialize`] and must be closed before a
//! replacement is acquired. Closing is idempotent and never fails.
//!
//! Adapters:
//! - [`FirmataSource`]: analog pins of a Firmata board over USB serial
//! - [`SimulatedSource`]: random samples around fixed centres, no hardware

pub mod firmata;
pub mod simulated;

pub use firmata::{FirmataBoard, FirmataDecoder, FirmataSource};
pub use simulated::{SimulatedBoard, SimulatedSource};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, SensorError};
use crate::reading::{RawSample, SensorKind};

/// Highest analog pin a Firmata `REPORT_ANALOG` command can address
pub const MAX_ANALOG_PIN: u8 = 15;

/// Analog pin assigned to each sensor kind (`None` = not wired)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorPins {
    pub soil_moisture: Option<u8>,
    pub air_temperature: Option<u8>,
    pub air_flow: Option<u8>,
    pub air_light: Option<u8>,
}

impl Default for SensorPins {
    fn default() -> Self {
        Self {
            soil_moisture: Some(0),
            air_temperature: Some(1),
            air_flow: Some(2),
            air_light: Some(3),
        }
    }
}

impl SensorPins {
    /// No pins wired
    pub fn none() -> Self {
        Self {
            soil_moisture: None,
            air_temperature: None,
            air_flow: None,
            air_light: None,
        }
    }

    pub fn pin(&self, kind: SensorKind) -> Option<u8> {
        match kind {
            SensorKind::SoilMoisture => self.soil_moisture,
            SensorKind::AirTemperature => self.air_temperature,
            SensorKind::AirFlow => self.air_flow,
            SensorKind::AirLight => self.air_light,
        }
    }

    /// Every wired pin must be addressable as an analog input
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self
            .configured()
            .into_iter()
            .find(|(_, pin)| *pin > MAX_ANALOG_PIN)
        {
            Some((kind, pin)) => Err(ConfigError::InvalidPins {
                reason: format!("{} on A{} (highest is A{})", kind, pin, MAX_ANALOG_PIN),
            }),
            None => Ok(()),
        }
    }

    /// Configured (kind, pin) pairs in store column order
    pub fn configured(&self) -> Vec<(SensorKind, u8)> {
        SensorKind::ALL
            .iter()
            .filter_map(|kind| self.pin(*kind).map(|pin| (*kind, pin)))
            .collect()
    }
}

/// An open link to the board
///
/// # Example Implementation
///
/// ```ignore
/// impl SensorHandle for FirmataBoard {
///     fn read(&mut self, kind: SensorKind) -> Result<Option<RawSample>, SensorError> {
///         let pin = self.pins.pin(kind).ok_or(SensorError::UnknownPin { kind })?;
///         self.drain()?;
///         Ok(self.latest.get(&pin).map(|v| *v as f64 / 1023.0))
///     }
///
///     fn close(&mut self) {
///         self.link.take();
///     }
/// }
/// ```
pub trait SensorHandle {
    /// Read the latest sample for `kind`
    ///
    /// Returns `Ok(None)` when the sensor has simply not reported; an `Err`
    /// means the link itself is broken.
    fn read(&mut self, kind: SensorKind) -> Result<Option<RawSample>, SensorError>;

    /// Release the link. Safe to call more than once; errors are swallowed.
    fn close(&mut self);
}

/// Factory for board handles
pub trait SensorSource {
    type Handle: SensorHandle;

    /// Open the board on `port` and enable reporting for the wired pins
    fn initialize(&mut self, port: &str, pins: &SensorPins) -> Result<Self::Handle, SensorError>;
}
