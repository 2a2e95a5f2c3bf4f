// Calibration module - raw analog samples to calibrated readings
//
// This module provides three components:
// 1. StatusScale: ascending status buckets for percentage readings
// 2. Profiles: per-sensor calibration constants (CalibrationSet)
// 3. Functions: the pure per-kind calibration functions
//
// Calibrating a sample:
// 1. Load a CalibrationSet (defaults or config file) and validate it
// 2. Call `calibrate(kind, raw, &set)` or the per-kind function
// 3. Absent or unusable samples come back as `CalibratedReading::none()`

pub mod functions;
pub mod profile;
pub mod scale;

pub use functions::{air_flow, air_light, air_temperature, calibrate, round_to, soil_moisture};
pub use profile::{
    AirFlowProfile, CalibrationSet, LightProfile, MoistureProfile, ThermistorProfile,
    DEFAULT_TEMPERATURE_OFFSET_C,
};
pub use scale::{StatusBand, StatusScale};
