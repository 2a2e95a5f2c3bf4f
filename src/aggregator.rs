// ReadingAggregator - one SampleSet in, one Reading out
//
// Every kind is always present in the output. A kind without a pin gets a
// `CalibratedReading::none()` placeholder so downstream consumers never
// have to handle a missing field.

use chrono::{DateTime, Utc};
use log::debug;

use crate::calibration::{calibrate, CalibrationSet};
use crate::reading::{CalibratedReading, Reading, SampleSet, SensorKind};

/// Applies the matching calibration function to each sampled kind
#[derive(Debug, Clone, Default)]
pub struct ReadingAggregator {
    calibration: CalibrationSet,
}

impl ReadingAggregator {
    pub fn new(calibration: CalibrationSet) -> Self {
        Self { calibration }
    }

    pub fn calibration(&self) -> &CalibrationSet {
        &self.calibration
    }

    /// Build the reading for one cycle
    ///
    /// # Arguments
    /// * `samples` - Raw samples keyed by kind (unconfigured kinds omitted)
    /// * `timestamp` - Time the cycle sampled the board
    pub fn aggregate(&self, samples: &SampleSet, timestamp: DateTime<Utc>) -> Reading {
        let mut reading = Reading::empty(timestamp);
        for kind in SensorKind::ALL {
            let calibrated = if samples.is_configured(kind) {
                calibrate(kind, samples.get(kind), &self.calibration)
            } else {
                debug!("[Aggregator] {} has no pin, leaving placeholder", kind);
                CalibratedReading::none()
            };
            *Self::slot(&mut reading, kind) = calibrated;
        }
        reading
    }

    fn slot(reading: &mut Reading, kind: SensorKind) -> &mut CalibratedReading {
        match kind {
            SensorKind::SoilMoisture => &mut reading.soil_moisture,
            SensorKind::AirTemperature => &mut reading.air_temperature,
            SensorKind::AirFlow => &mut reading.air_flow,
            SensorKind::AirLight => &mut reading.air_light,
        }
    }
}
