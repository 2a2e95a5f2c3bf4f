//! Reading data model shared by the aggregator, controller and stores.
//!
//! A [`Reading`] always carries all four sensor fields. Missing data shows
//! up as a [`CalibratedReading`] with every field `None`, never as an
//! omitted field.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Unitless analog sample in `[0.0, 1.0]` as delivered by the board.
///
/// Absence (sensor not reporting this cycle) is expressed as
/// `Option<RawSample>::None` rather than a sentinel value.
pub type RawSample = f64;

/// The sensor kinds attached to the field logger board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    SoilMoisture,
    AirTemperature,
    AirFlow,
    AirLight,
}

impl SensorKind {
    /// Every kind, in the column order used by the store
    pub const ALL: [SensorKind; 4] = [
        SensorKind::SoilMoisture,
        SensorKind::AirTemperature,
        SensorKind::AirFlow,
        SensorKind::AirLight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SensorKind::SoilMoisture => "soil_moisture",
            SensorKind::AirTemperature => "air_temperature",
            SensorKind::AirFlow => "air_flow",
            SensorKind::AirLight => "air_light",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SensorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SensorKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "unknown sensor kind '{}' (expected one of: soil_moisture, air_temperature, air_flow, air_light)",
                    s
                )
            })
    }
}

/// Raw samples collected during one poll cycle
///
/// A kind that is present with `None` was configured but did not report;
/// a kind that is missing entirely has no pin assigned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleSet {
    samples: BTreeMap<SensorKind, Option<RawSample>>,
}

impl SampleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: SensorKind, sample: Option<RawSample>) {
        self.samples.insert(kind, sample);
    }

    /// Builder-style insert, handy for fixtures
    pub fn with(mut self, kind: SensorKind, sample: Option<RawSample>) -> Self {
        self.insert(kind, sample);
        self
    }

    pub fn is_configured(&self, kind: SensorKind) -> bool {
        self.samples.contains_key(&kind)
    }

    /// Sample for `kind`, flattening "not configured" and "absent"
    pub fn get(&self, kind: SensorKind) -> Option<RawSample> {
        self.samples.get(&kind).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Result of applying one calibration profile to one raw sample
///
/// - `value`: physical quantity (°C for temperature, m/s for air flow)
/// - `percentage`: clamped to `[0, 100]` for percentage-style sensors
/// - `status`: qualitative bucket label
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibratedReading {
    pub value: Option<f64>,
    pub percentage: Option<f64>,
    pub status: Option<String>,
}

impl CalibratedReading {
    /// All-`None` placeholder for absent or failed samples
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_none(&self) -> bool {
        self.value.is_none() && self.percentage.is_none() && self.status.is_none()
    }
}

/// Primary values of a complete reading, in store column order
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrimaryValues {
    /// Soil moisture percentage
    pub soil_moisture: f64,
    /// Air temperature in °C
    pub air_temp: f64,
    /// Air flow speed in m/s
    pub air_flow: f64,
    /// Air light percentage
    pub air_light: f64,
}

/// One multi-sensor reading produced per poll cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    pub soil_moisture: CalibratedReading,
    pub air_temperature: CalibratedReading,
    pub air_flow: CalibratedReading,
    pub air_light: CalibratedReading,
}

impl Reading {
    /// Reading with every field unavailable
    pub fn empty(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            soil_moisture: CalibratedReading::none(),
            air_temperature: CalibratedReading::none(),
            air_flow: CalibratedReading::none(),
            air_light: CalibratedReading::none(),
        }
    }

    pub fn field(&self, kind: SensorKind) -> &CalibratedReading {
        match kind {
            SensorKind::SoilMoisture => &self.soil_moisture,
            SensorKind::AirTemperature => &self.air_temperature,
            SensorKind::AirFlow => &self.air_flow,
            SensorKind::AirLight => &self.air_light,
        }
    }

    /// The value that gets persisted for `kind`
    ///
    /// Soil moisture and light persist their percentage; temperature and
    /// air flow persist their physical value (°C, m/s).
    pub fn primary_value(&self, kind: SensorKind) -> Option<f64> {
        let field = self.field(kind);
        match kind {
            SensorKind::SoilMoisture | SensorKind::AirLight => field.percentage,
            SensorKind::AirTemperature | SensorKind::AirFlow => field.value,
        }
    }

    /// Kinds whose primary value is unavailable
    pub fn missing_kinds(&self) -> Vec<SensorKind> {
        SensorKind::ALL
            .iter()
            .copied()
            .filter(|kind| self.primary_value(*kind).is_none())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_kinds().is_empty()
    }

    /// Primary values, only when every field is present
    pub fn primary_values(&self) -> Option<PrimaryValues> {
        Some(PrimaryValues {
            soil_moisture: self.primary_value(SensorKind::SoilMoisture)?,
            air_temp: self.primary_value(SensorKind::AirTemperature)?,
            air_flow: self.primary_value(SensorKind::AirFlow)?,
            air_light: self.primary_value(SensorKind::AirLight)?,
        })
    }
}

/// A reading as it comes back from the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedReading {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub values: PrimaryValues,
}

/// Inclusive time range used for history queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Create a window; bounds given in reverse order are swapped
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// Window covering the last `hours` hours up to `now`
    ///
    /// Negative hours give an empty-width window at `now`; spans reaching
    /// past the earliest representable time start at `DateTime::<Utc>::MIN_UTC`.
    pub fn last_hours(now: DateTime<Utc>, hours: i64) -> Self {
        let start = Duration::try_hours(hours.max(0))
            .and_then(|span| now.checked_sub_signed(span))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self::new(start, now)
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.start <= timestamp && timestamp <= self.end
    }
}
