// Calibration profiles - per-sensor constants used by the calibration functions
//
// Profiles are loaded once at startup (see AppConfig) and treated as
// read-only afterwards. Constants drifted across hardware revisions, so
// every value here is a default that the config file can override.

use serde::{Deserialize, Serialize};

use crate::calibration::scale::StatusScale;
use crate::error::ConfigError;
use crate::reading::SensorKind;

/// Offset added to thermistor readings to correct observed board bias (°C)
pub const DEFAULT_TEMPERATURE_OFFSET_C: f64 = -2.0;

const KELVIN_OFFSET: f64 = 273.15;

/// Capacitive moisture sensor (or any inverted percentage sensor)
///
/// `wet_value` maps to 100 %, `dry_value` to 0 %; raw samples outside the
/// pair are clamped first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoistureProfile {
    pub wet_value: f64,
    pub dry_value: f64,
    pub scale: StatusScale,
}

impl Default for MoistureProfile {
    fn default() -> Self {
        Self {
            wet_value: 0.49,
            dry_value: 0.66,
            scale: StatusScale::moisture(),
        }
    }
}

/// NTC thermistor in a voltage divider, B-parameter model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThermistorProfile {
    /// Fixed divider resistor (Ω)
    pub series_resistor: f64,
    /// Thermistor resistance at the nominal temperature (Ω)
    pub nominal_resistance: f64,
    /// Nominal temperature (°C)
    pub nominal_temp_c: f64,
    /// Beta coefficient (K)
    pub beta: f64,
    /// Bias correction applied after conversion (°C)
    pub offset_c: f64,
}

impl Default for ThermistorProfile {
    fn default() -> Self {
        Self {
            series_resistor: 10_000.0,
            nominal_resistance: 10_000.0,
            nominal_temp_c: 25.0,
            beta: 3950.0,
            offset_c: DEFAULT_TEMPERATURE_OFFSET_C,
        }
    }
}

impl ThermistorProfile {
    pub fn nominal_temp_kelvin(&self) -> f64 {
        self.nominal_temp_c + KELVIN_OFFSET
    }
}

/// Analog anemometer mapped linearly onto percentage and wind speed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AirFlowProfile {
    /// Raw sample at still air
    pub min_value: f64,
    /// Raw sample at full scale
    pub max_value: f64,
    /// Wind speed per percentage point (m/s)
    pub speed_per_percent: f64,
    pub scale: StatusScale,
}

impl Default for AirFlowProfile {
    fn default() -> Self {
        Self {
            min_value: 0.0,
            max_value: 1.0,
            speed_per_percent: 0.3,
            scale: StatusScale::air_flow(),
        }
    }
}

/// Photoresistor divider, raw sample is already proportional to brightness
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightProfile {
    pub scale: StatusScale,
}

impl Default for LightProfile {
    fn default() -> Self {
        Self {
            scale: StatusScale::light(),
        }
    }
}

/// Calibration constants for every sensor kind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationSet {
    pub soil_moisture: MoistureProfile,
    pub air_temperature: ThermistorProfile,
    pub air_flow: AirFlowProfile,
    pub air_light: LightProfile,
}

impl CalibrationSet {
    /// Unit label shown next to the primary value of `kind`
    pub fn unit(kind: SensorKind) -> &'static str {
        match kind {
            SensorKind::SoilMoisture | SensorKind::AirLight => "%",
            SensorKind::AirTemperature => "°C",
            SensorKind::AirFlow => "m/s",
        }
    }

    /// Check every profile invariant
    ///
    /// # Errors
    /// - `ConfigError::InvalidProfile` if a raw range is empty or inverted,
    ///   or a thermistor constant would divide by zero
    /// - `ConfigError::InvalidScale` if a status scale is malformed
    pub fn validate(&self) -> Result<(), ConfigError> {
        let moisture = &self.soil_moisture;
        check_range(
            SensorKind::SoilMoisture,
            moisture.wet_value,
            moisture.dry_value,
            "wet_value",
            "dry_value",
        )?;
        moisture.scale.validate()?;

        let thermistor = &self.air_temperature;
        let positive = [
            ("series_resistor", thermistor.series_resistor),
            ("nominal_resistance", thermistor.nominal_resistance),
            ("nominal_temp_kelvin", thermistor.nominal_temp_kelvin()),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(invalid(
                    SensorKind::AirTemperature,
                    format!("{} must be positive (got {})", name, value),
                ));
            }
        }
        if !thermistor.beta.is_finite() || thermistor.beta == 0.0 {
            return Err(invalid(
                SensorKind::AirTemperature,
                format!("beta must be non-zero (got {})", thermistor.beta),
            ));
        }
        if !thermistor.offset_c.is_finite() {
            return Err(invalid(
                SensorKind::AirTemperature,
                "offset_c must be finite".to_string(),
            ));
        }

        let flow = &self.air_flow;
        check_range(
            SensorKind::AirFlow,
            flow.min_value,
            flow.max_value,
            "min_value",
            "max_value",
        )?;
        if !(flow.speed_per_percent.is_finite() && flow.speed_per_percent >= 0.0) {
            return Err(invalid(
                SensorKind::AirFlow,
                format!(
                    "speed_per_percent must be non-negative (got {})",
                    flow.speed_per_percent
                ),
            ));
        }
        flow.scale.validate()?;

        self.air_light.scale.validate()
    }
}

fn invalid(kind: SensorKind, reason: String) -> ConfigError {
    ConfigError::InvalidProfile { kind, reason }
}

fn check_range(
    kind: SensorKind,
    low: f64,
    high: f64,
    low_name: &str,
    high_name: &str,
) -> Result<(), ConfigError> {
    if !(low.is_finite() && high.is_finite()) {
        return Err(invalid(
            kind,
            format!("{} and {} must be finite", low_name, high_name),
        ));
    }
    if low >= high {
        return Err(invalid(
            kind,
            format!(
                "{} ({}) must be below {} ({})",
                low_name, low, high_name, high
            ),
        ));
    }
    Ok(())
}
