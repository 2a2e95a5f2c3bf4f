// Calibration functions - raw sample to calibrated reading
//
// All four functions are pure and total: an absent sample or any arithmetic
// failure yields `CalibratedReading::none()` for that sensor only. Nothing
// here returns an error or panics on odd input.

use log::debug;

use crate::calibration::profile::{
    AirFlowProfile, CalibrationSet, LightProfile, MoistureProfile, ThermistorProfile,
};
use crate::reading::{CalibratedReading, RawSample, SensorKind};

/// Round half away from zero to `places` decimals
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10_f64.powi(places);
    (value * factor).round() / factor
}

fn clamp_percentage(percentage: f64) -> f64 {
    percentage.clamp(0.0, 100.0)
}

fn finite(raw: Option<RawSample>) -> Option<f64> {
    raw.filter(|value| value.is_finite())
}

/// Dispatch to the calibration function for `kind`
pub fn calibrate(
    kind: SensorKind,
    raw: Option<RawSample>,
    calibration: &CalibrationSet,
) -> CalibratedReading {
    match kind {
        SensorKind::SoilMoisture => soil_moisture(raw, &calibration.soil_moisture),
        SensorKind::AirTemperature => air_temperature(raw, &calibration.air_temperature),
        SensorKind::AirFlow => air_flow(raw, &calibration.air_flow),
        SensorKind::AirLight => air_light(raw, &calibration.air_light),
    }
}

/// Moisture percentage from an inverted sensor
///
/// `percentage = round((dry - clamp(raw, wet, dry)) / (dry - wet) * 100, 1)`,
/// clamped to `[0, 100]` and bucketed with the profile's scale.
pub fn soil_moisture(raw: Option<RawSample>, profile: &MoistureProfile) -> CalibratedReading {
    let Some(raw) = finite(raw) else {
        return CalibratedReading::none();
    };
    let (wet, dry) = (profile.wet_value, profile.dry_value);
    if !(wet < dry) {
        debug!(
            "[Calibration] soil moisture bounds unusable: wet={} dry={}",
            wet, dry
        );
        return CalibratedReading::none();
    }

    let constrained = raw.clamp(wet, dry);
    let percentage = clamp_percentage(round_to((dry - constrained) / (dry - wet) * 100.0, 1));

    CalibratedReading {
        value: None,
        percentage: Some(percentage),
        status: Some(profile.scale.label_for(percentage).to_string()),
    }
}

/// Air temperature in °C from a thermistor divider ratio
///
/// `raw == 0` means an open divider (infinite resistance) and `raw == 1` a
/// shorted one (zero resistance). Either way a non-positive resistance or a
/// non-physical Kelvin result degrades to `None`.
pub fn air_temperature(raw: Option<RawSample>, profile: &ThermistorProfile) -> CalibratedReading {
    let Some(raw) = finite(raw) else {
        return CalibratedReading::none();
    };

    match thermistor_celsius(raw, profile) {
        Some(celsius) => CalibratedReading {
            value: Some(celsius),
            percentage: None,
            status: None,
        },
        None => {
            debug!("[Calibration] air temperature undefined for raw={}", raw);
            CalibratedReading::none()
        }
    }
}

fn thermistor_celsius(raw: f64, profile: &ThermistorProfile) -> Option<f64> {
    let resistance = if raw == 0.0 {
        f64::INFINITY
    } else if raw == 1.0 {
        0.0
    } else {
        profile.series_resistor * (1.0 - raw) / raw
    };

    // ln() of zero or a negative ratio has no temperature
    if resistance.is_nan() || resistance <= 0.0 {
        return None;
    }

    let inverse_kelvin = (resistance / profile.nominal_resistance).ln() / profile.beta
        + 1.0 / profile.nominal_temp_kelvin();
    let kelvin = 1.0 / inverse_kelvin;
    if !kelvin.is_finite() || kelvin <= 0.0 {
        return None;
    }

    let celsius = round_to(kelvin - 273.15, 1);
    let corrected = round_to(celsius + profile.offset_c, 1);
    corrected.is_finite().then_some(corrected)
}

/// Air flow percentage and wind speed from an analog anemometer
///
/// Speed is `percentage * speed_per_percent` rounded to two decimals and
/// never negative.
pub fn air_flow(raw: Option<RawSample>, profile: &AirFlowProfile) -> CalibratedReading {
    let Some(raw) = finite(raw) else {
        return CalibratedReading::none();
    };
    let (low, high) = (profile.min_value, profile.max_value);
    if !(low < high) {
        debug!("[Calibration] air flow bounds unusable: min={} max={}", low, high);
        return CalibratedReading::none();
    }

    let constrained = raw.clamp(low, high);
    let linear = (constrained - low) / (high - low) * 100.0;
    let speed = round_to(linear * profile.speed_per_percent, 2).max(0.0);
    let percentage = clamp_percentage(round_to(linear, 1));
    if !speed.is_finite() {
        return CalibratedReading::none();
    }

    CalibratedReading {
        value: Some(speed),
        percentage: Some(percentage),
        status: Some(profile.scale.label_for(percentage).to_string()),
    }
}

/// Light percentage, proportional to the raw sample
pub fn air_light(raw: Option<RawSample>, profile: &LightProfile) -> CalibratedReading {
    let Some(raw) = finite(raw) else {
        return CalibratedReading::none();
    };

    let percentage = clamp_percentage(round_to(raw * 100.0, 1));

    CalibratedReading {
        value: None,
        percentage: Some(percentage),
        status: Some(profile.scale.label_for(percentage).to_string()),
    }
}
