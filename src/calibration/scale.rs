// StatusScale - qualitative buckets for percentage readings
//
// A scale is an ascending list of (upper_bound, label) bands plus a label
// for everything at or above the last bound. Lookup uses `<`, so a value
// sitting exactly on a bound falls into the next bucket up (20.0 is "Dry",
// not "Very Dry").

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

static MOISTURE_SCALE: Lazy<StatusScale> = Lazy::new(|| {
    StatusScale::new(
        &[(20.0, "Very Dry"), (40.0, "Dry"), (60.0, "Moderate"), (80.0, "Moist")],
        "Wet",
    )
});

static AIR_FLOW_SCALE: Lazy<StatusScale> = Lazy::new(|| {
    StatusScale::new(
        &[(20.0, "Very Low"), (40.0, "Low"), (60.0, "Moderate"), (80.0, "High")],
        "Very High",
    )
});

static LIGHT_SCALE: Lazy<StatusScale> = Lazy::new(|| {
    StatusScale::new(
        &[(20.0, "Very Dark"), (40.0, "Dark"), (60.0, "Moderate"), (80.0, "Bright")],
        "Very Bright",
    )
});

/// One bounded bucket of a scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusBand {
    /// Exclusive upper bound of the bucket
    pub upper_bound: f64,
    pub label: String,
}

/// Ordered status buckets covering `[0, 100]`, last bucket unbounded above
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusScale {
    pub bands: Vec<StatusBand>,
    pub top_label: String,
}

impl StatusScale {
    pub fn new(bands: &[(f64, &str)], top_label: &str) -> Self {
        Self {
            bands: bands
                .iter()
                .map(|(upper_bound, label)| StatusBand {
                    upper_bound: *upper_bound,
                    label: (*label).to_string(),
                })
                .collect(),
            top_label: top_label.to_string(),
        }
    }

    /// Soil / generic moisture labels: Very Dry .. Wet
    pub fn moisture() -> Self {
        MOISTURE_SCALE.clone()
    }

    /// Air flow labels: Very Low .. Very High
    pub fn air_flow() -> Self {
        AIR_FLOW_SCALE.clone()
    }

    /// Light labels: Very Dark .. Very Bright
    pub fn light() -> Self {
        LIGHT_SCALE.clone()
    }

    /// Label for a percentage
    pub fn label_for(&self, percentage: f64) -> &str {
        self.bands
            .iter()
            .find(|band| percentage < band.upper_bound)
            .map(|band| band.label.as_str())
            .unwrap_or(self.top_label.as_str())
    }

    /// Every label this scale can produce, lowest bucket first
    pub fn labels(&self) -> Vec<&str> {
        self.bands
            .iter()
            .map(|band| band.label.as_str())
            .chain(std::iter::once(self.top_label.as_str()))
            .collect()
    }

    /// Check bounds are finite, inside `(0, 100]` and strictly ascending
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut previous = 0.0_f64;
        for band in &self.bands {
            if !band.upper_bound.is_finite() || band.upper_bound > 100.0 {
                return Err(ConfigError::InvalidScale {
                    reason: format!(
                        "bound {} for '{}' must be finite and at most 100",
                        band.upper_bound, band.label
                    ),
                });
            }
            if band.upper_bound <= previous {
                return Err(ConfigError::InvalidScale {
                    reason: format!(
                        "bound {} for '{}' is not above the previous bound {}",
                        band.upper_bound, band.label, previous
                    ),
                });
            }
            previous = band.upper_bound;
        }
        Ok(())
    }
}
