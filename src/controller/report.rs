// Reports handed to the presentation boundary
//
// Failures are returned as values. The controller never renders anything;
// whoever holds a report decides how to show it.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::controller::state::{CycleOutcome, CycleState};
use crate::error::{ErrorCode, SensorError, StorageError};
use crate::reading::{Reading, SensorKind};

/// Classification shown next to the latest reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorClass {
    /// Board link unusable after one reconnect attempt
    SensorTransportError,
    /// Reading missing at least one primary value, not persisted
    ValidationIncomplete,
    /// Store rejected the write
    PersistenceError,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorClass::SensorTransportError => "SensorTransportError",
            ErrorClass::ValidationIncomplete => "ValidationIncomplete",
            ErrorClass::PersistenceError => "PersistenceError",
        };
        f.write_str(name)
    }
}

/// Most recent failure of a poll cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReport {
    pub class: ErrorClass,
    /// Numeric code of the underlying error, `None` for validation warnings
    pub code: Option<i32>,
    pub message: String,
    /// Kinds without a primary value (validation only)
    pub missing: Vec<SensorKind>,
    pub timestamp: DateTime<Utc>,
}

impl ErrorReport {
    pub fn transport(err: &SensorError, timestamp: DateTime<Utc>) -> Self {
        Self {
            class: ErrorClass::SensorTransportError,
            code: Some(err.code()),
            message: err.message(),
            missing: Vec::new(),
            timestamp,
        }
    }

    pub fn incomplete(missing: Vec<SensorKind>, timestamp: DateTime<Utc>) -> Self {
        let names: Vec<&str> = missing.iter().map(|kind| kind.as_str()).collect();
        Self {
            class: ErrorClass::ValidationIncomplete,
            code: None,
            message: format!("Reading not saved, missing: {}", names.join(", ")),
            missing,
            timestamp,
        }
    }

    pub fn persistence(err: &StorageError, timestamp: DateTime<Utc>) -> Self {
        Self {
            class: ErrorClass::PersistenceError,
            code: Some(err.code()),
            message: err.message(),
            missing: Vec::new(),
            timestamp,
        }
    }

    /// Validation reports are warnings; the others are errors
    pub fn is_warning(&self) -> bool {
        self.class == ErrorClass::ValidationIncomplete
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} (code {}): {}", self.class, code, self.message),
            None => write!(f, "{}: {}", self.class, self.message),
        }
    }
}

/// Everything one poll cycle produced, published after the cycle ends
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// 1-based cycle number
    pub cycle: u64,
    pub outcome: CycleOutcome,
    /// `None` when the cycle aborted before calibration
    pub reading: Option<Reading>,
    pub error: Option<ErrorReport>,
    /// States visited, starting and ending at `Idle`
    pub path: Vec<CycleState>,
}

impl CycleReport {
    pub fn reconnected(&self) -> bool {
        self.path.contains(&CycleState::Reconnecting)
    }
}

/// Running counters across cycles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleStats {
    pub cycles: u64,
    pub persisted: u64,
    pub incomplete: u64,
    pub store_failed: u64,
    pub aborted: u64,
    pub reconnects: u64,
}

impl CycleStats {
    pub fn record(&mut self, report: &CycleReport) {
        self.cycles += 1;
        if report.reconnected() {
            self.reconnects += 1;
        }
        match report.outcome {
            CycleOutcome::Persisted(_) => self.persisted += 1,
            CycleOutcome::Incomplete { .. } => self.incomplete += 1,
            CycleOutcome::StoreFailed => self.store_failed += 1,
            CycleOutcome::Aborted => self.aborted += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_transport_report_carries_code() {
        let err = SensorError::Transport {
            details: "unplugged".to_string(),
        };
        let report = ErrorReport::transport(&err, now());
        assert_eq!(report.class, ErrorClass::SensorTransportError);
        assert_eq!(report.code, Some(1003));
        assert!(!report.is_warning());
        assert!(report.to_string().starts_with("SensorTransportError (code 1003)"));
    }

    #[test]
    fn test_incomplete_report_is_warning() {
        let report = ErrorReport::incomplete(vec![SensorKind::AirFlow], now());
        assert!(report.is_warning());
        assert_eq!(report.code, None);
        assert_eq!(
            report.to_string(),
            "ValidationIncomplete: Reading not saved, missing: air_flow"
        );
    }

    #[test]
    fn test_stats_record_outcomes() {
        let mut stats = CycleStats::default();
        let base = CycleReport {
            cycle: 1,
            outcome: CycleOutcome::Aborted,
            reading: None,
            error: None,
            path: vec![
                CycleState::Idle,
                CycleState::Sampling,
                CycleState::Reconnecting,
                CycleState::Sampling,
                CycleState::Idle,
            ],
        };
        stats.record(&base);
        stats.record(&CycleReport {
            outcome: CycleOutcome::StoreFailed,
            path: vec![CycleState::Idle],
            ..base.clone()
        });

        assert_eq!(stats.cycles, 2);
        assert_eq!(stats.aborted, 1);
        assert_eq!(stats.store_failed, 1);
        assert_eq!(stats.reconnects, 1);
        assert_eq!(stats.persisted, 0);
    }
}
