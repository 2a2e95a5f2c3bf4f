//! Poll cycle controller
//!
//! Drives one sample → calibrate → validate → persist iteration per call to
//! [`PollController::run_cycle`]. Cadence is left to the caller.
//!
//! Failure handling per cycle:
//! - an absent sample is data, it becomes a `None` field
//! - a transport error closes the handle, reinitializes once and retries
//!   sampling once; a second failure aborts the cycle
//! - an incomplete reading is kept as the latest reading but never stored
//! - a store failure is reported and the reading dropped (one write attempt)
//!
//! The controller is the single owner of the sensor handle. It is created
//! lazily on the first cycle and released by [`PollController::shutdown`].

pub mod report;
pub mod state;

pub use report::{CycleReport, CycleStats, ErrorClass, ErrorReport};
pub use state::{CycleOutcome, CycleState};

use chrono::{DateTime, Utc};
use log::{debug, warn};
use tokio::sync::broadcast;

use crate::aggregator::ReadingAggregator;
use crate::calibration::CalibrationSet;
use crate::config::AppConfig;
use crate::error::{log_sensor_error, log_storage_error, SensorError};
use crate::managers::BroadcastChannelManager;
use crate::reading::{Reading, SampleSet};
use crate::sensor::{SensorHandle, SensorPins, SensorSource};
use crate::storage::ReadingStore;

type Clock = Box<dyn FnMut() -> DateTime<Utc>>;

/// Owns the sensor handle and the store for the lifetime of a polling run
pub struct PollController<S: SensorSource, P: ReadingStore> {
    source: S,
    store: P,
    port: String,
    pins: SensorPins,
    aggregator: ReadingAggregator,
    handle: Option<S::Handle>,
    state: CycleState,
    latest: Option<Reading>,
    last_error: Option<ErrorReport>,
    stats: CycleStats,
    channels: BroadcastChannelManager,
    clock: Clock,
}

impl<S: SensorSource, P: ReadingStore> PollController<S, P> {
    /// Create a controller; no connection is made until the first cycle
    ///
    /// # Arguments
    /// * `source` - Opens handles to the board
    /// * `store` - Receives complete readings
    /// * `port` - Port identifier passed to `source.initialize`
    /// * `pins` - Sensor-to-pin mapping; unset pins yield placeholder fields
    /// * `calibration` - Calibration constants per sensor kind
    pub fn new(
        source: S,
        store: P,
        port: impl Into<String>,
        pins: SensorPins,
        calibration: CalibrationSet,
    ) -> Self {
        let channels = BroadcastChannelManager::new();
        channels.init_reports();
        Self {
            source,
            store,
            port: port.into(),
            pins,
            aggregator: ReadingAggregator::new(calibration),
            handle: None,
            state: CycleState::Idle,
            latest: None,
            last_error: None,
            stats: CycleStats::default(),
            channels,
            clock: Box::new(Utc::now),
        }
    }

    pub fn from_config(config: &AppConfig, source: S, store: P) -> Self {
        Self::new(
            source,
            store,
            config.board.port.clone(),
            config.pins,
            config.calibration.clone(),
        )
    }

    /// Replace the wall clock used to timestamp readings
    pub fn with_clock(mut self, clock: impl FnMut() -> DateTime<Utc> + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Publish reports through a shared manager instead of a private one
    pub fn with_channels(mut self, channels: BroadcastChannelManager) -> Self {
        if channels.subscribe_reports().is_none() {
            channels.init_reports();
        }
        self.channels = channels;
        self
    }

    /// Run one complete poll cycle
    ///
    /// Never returns an error: every failure is classified into the returned
    /// report, stored as `last_error()` and published to subscribers.
    pub fn run_cycle(&mut self) -> CycleReport {
        let cycle = self.stats.cycles + 1;
        let timestamp = (self.clock)();
        self.last_error = None;

        let mut path = vec![self.state];
        self.enter(CycleState::Sampling, &mut path);

        let (outcome, reading) = match self.sample_with_retry(&mut path) {
            Ok(samples) => {
                let (outcome, reading) = self.process(&samples, timestamp, &mut path);
                (outcome, Some(reading))
            }
            Err(err) => {
                log_sensor_error(&err, "run_cycle");
                self.release_handle();
                self.last_error = Some(ErrorReport::transport(&err, timestamp));
                (CycleOutcome::Aborted, None)
            }
        };
        self.enter(CycleState::Idle, &mut path);

        let report = CycleReport {
            cycle,
            outcome,
            reading,
            error: self.last_error.clone(),
            path,
        };
        self.stats.record(&report);

        tracing::info!(
            target: "field_logger.controller",
            cycle,
            outcome = report.outcome.label(),
            reconnected = report.reconnected(),
            "poll cycle finished"
        );
        let delivered = self.channels.publish(report.clone());
        debug!("[PollController] cycle {} report sent to {} subscribers", cycle, delivered);

        report
    }

    /// Calibrating → Validating → (Persisting)
    fn process(
        &mut self,
        samples: &SampleSet,
        timestamp: DateTime<Utc>,
        path: &mut Vec<CycleState>,
    ) -> (CycleOutcome, Reading) {
        self.enter(CycleState::Calibrating, path);
        let reading = self.aggregator.aggregate(samples, timestamp);
        self.latest = Some(reading.clone());

        self.enter(CycleState::Validating, path);
        let missing = reading.missing_kinds();
        if !missing.is_empty() {
            let report = ErrorReport::incomplete(missing.clone(), timestamp);
            warn!("[PollController] {}", report.message);
            self.last_error = Some(report);
            return (CycleOutcome::Incomplete { missing }, reading);
        }

        self.enter(CycleState::Persisting, path);
        let outcome = match self.store.store(&reading) {
            Ok(ack) => {
                debug!("[PollController] reading stored as row {}", ack.id);
                CycleOutcome::Persisted(ack)
            }
            Err(err) => {
                log_storage_error(&err, "run_cycle");
                self.last_error = Some(ErrorReport::persistence(&err, timestamp));
                CycleOutcome::StoreFailed
            }
        };
        (outcome, reading)
    }

    /// Sample, and on a transport error reconnect once and sample again
    fn sample_with_retry(&mut self, path: &mut Vec<CycleState>) -> Result<SampleSet, SensorError> {
        let first = match self.sample_once() {
            Ok(samples) => return Ok(samples),
            Err(err) => err,
        };
        warn!("[PollController] sampling failed, reconnecting: {}", first);

        self.enter(CycleState::Reconnecting, path);
        self.reconnect()?;

        self.enter(CycleState::Sampling, path);
        self.sample_once()
    }

    fn sample_once(&mut self) -> Result<SampleSet, SensorError> {
        if self.handle.is_none() {
            self.handle = Some(self.source.initialize(&self.port, &self.pins)?);
        }
        let handle = self.handle.as_mut().ok_or(SensorError::NotInitialized)?;

        let mut samples = SampleSet::new();
        for (kind, _) in self.pins.configured() {
            samples.insert(kind, handle.read(kind)?);
        }
        Ok(samples)
    }

    /// Close the current handle (if any) and open a fresh one
    fn reconnect(&mut self) -> Result<(), SensorError> {
        self.release_handle();
        let handle = self.source.initialize(&self.port, &self.pins)?;
        self.handle = Some(handle);
        Ok(())
    }

    fn release_handle(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.close();
        }
    }

    fn enter(&mut self, next: CycleState, path: &mut Vec<CycleState>) {
        if !self.state.can_transition_to(next) {
            warn!("[PollController] unexpected transition {} -> {}", self.state, next);
        }
        self.state = next;
        path.push(next);
    }

    /// Release the sensor handle; the next cycle reconnects
    pub fn shutdown(&mut self) {
        if self.handle.is_some() {
            debug!("[PollController] releasing sensor handle on {}", self.port);
        }
        self.release_handle();
        self.state = CycleState::Idle;
    }

    /// Most recent reading, including `None` fields when unavailable
    ///
    /// Kept across aborted cycles; `None` only before the first reading.
    pub fn latest_reading(&self) -> Option<&Reading> {
        self.latest.as_ref()
    }

    /// Failure of the most recent cycle, `None` if it completed cleanly
    pub fn last_error(&self) -> Option<&ErrorReport> {
        self.last_error.as_ref()
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn stats(&self) -> CycleStats {
        self.stats
    }

    pub fn is_connected(&self) -> bool {
        self.handle.is_some()
    }

    /// Receive a [`CycleReport`] after every cycle
    pub fn subscribe(&self) -> Option<broadcast::Receiver<CycleReport>> {
        self.channels.subscribe_reports()
    }

    pub fn channels(&self) -> &BroadcastChannelManager {
        &self.channels
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn store(&self) -> &P {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut P {
        &mut self.store
    }
}
