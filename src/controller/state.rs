// Poll cycle states and outcomes

use std::fmt;

use serde::Serialize;

use crate::reading::SensorKind;
use crate::storage::StoreAck;

/// Where the controller is within one poll cycle
///
/// Normal path: `Idle → Sampling → Calibrating → Validating → Persisting → Idle`.
/// Recovery edge: `Sampling → Reconnecting → Sampling`, taken at most once
/// per cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleState {
    Idle,
    Sampling,
    Reconnecting,
    Calibrating,
    Validating,
    Persisting,
}

impl CycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleState::Idle => "idle",
            CycleState::Sampling => "sampling",
            CycleState::Reconnecting => "reconnecting",
            CycleState::Calibrating => "calibrating",
            CycleState::Validating => "validating",
            CycleState::Persisting => "persisting",
        }
    }

    /// Whether `next` is a legal successor of `self`
    ///
    /// `Sampling → Idle` and `Reconnecting → Idle` are the abort edges;
    /// `Validating → Idle` skips persistence for an incomplete reading.
    pub fn can_transition_to(&self, next: CycleState) -> bool {
        use CycleState::*;
        matches!(
            (self, next),
            (Idle, Sampling)
                | (Sampling, Calibrating)
                | (Sampling, Reconnecting)
                | (Sampling, Idle)
                | (Reconnecting, Sampling)
                | (Reconnecting, Idle)
                | (Calibrating, Validating)
                | (Validating, Persisting)
                | (Validating, Idle)
                | (Persisting, Idle)
        )
    }
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a poll cycle ended
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Reading was complete and the store accepted it
    Persisted(StoreAck),

    /// At least one primary value was unavailable; store not called
    Incomplete { missing: Vec<SensorKind> },

    /// Store rejected the write; not retried
    StoreFailed,

    /// Sensor transport failed on the attempt and on the single retry
    Aborted,
}

impl CycleOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            CycleOutcome::Persisted(_) => "persisted",
            CycleOutcome::Incomplete { .. } => "incomplete",
            CycleOutcome::StoreFailed => "store_failed",
            CycleOutcome::Aborted => "aborted",
        }
    }

    pub fn is_persisted(&self) -> bool {
        matches!(self, CycleOutcome::Persisted(_))
    }
}
