//! Reading store boundary - persisting readings and reading history back
//!
//! The poll controller only ever hands a store complete readings. A store
//! still refuses incomplete ones so the invariant holds for any caller.
//!
//! Adapters:
//! - [`SqliteStore`]: `sensor_data` table in a SQLite database
//! - [`MemoryStore`]: vector-backed store for dry runs and tests

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::{SqliteStore, StorageConfig};

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::error::{log_storage_error, StorageError};
use crate::reading::{PersistedReading, PrimaryValues, Reading, TimeWindow};

/// Acknowledgement for a stored reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreAck {
    /// Row id assigned by the store
    pub id: i64,
}

/// Port for persisting and querying readings
pub trait ReadingStore {
    /// Persist one complete reading
    ///
    /// # Errors
    /// - `StorageError::InsertFailed` if the reading is incomplete or the
    ///   backend rejects the write
    fn store(&mut self, reading: &Reading) -> Result<StoreAck, StorageError>;

    /// Readings with `window.start <= timestamp <= window.end`, oldest first
    fn query(&self, window: &TimeWindow) -> Result<Vec<PersistedReading>, StorageError>;
}

impl<S: ReadingStore + ?Sized> ReadingStore for Box<S> {
    fn store(&mut self, reading: &Reading) -> Result<StoreAck, StorageError> {
        (**self).store(reading)
    }

    fn query(&self, window: &TimeWindow) -> Result<Vec<PersistedReading>, StorageError> {
        (**self).query(window)
    }
}

/// Shared store, e.g. a dashboard querying history while the controller writes
impl<S: ReadingStore> ReadingStore for Arc<Mutex<S>> {
    fn store(&mut self, reading: &Reading) -> Result<StoreAck, StorageError> {
        self.lock()
            .map_err(|_| poisoned("store"))?
            .store(reading)
    }

    fn query(&self, window: &TimeWindow) -> Result<Vec<PersistedReading>, StorageError> {
        self.lock()
            .map_err(|_| poisoned("query"))?
            .query(window)
    }
}

fn poisoned(context: &str) -> StorageError {
    let err = StorageError::LockPoisoned;
    log_storage_error(&err, context);
    err
}

/// History for the last `hours` hours ending at `now`
pub fn recent<S: ReadingStore + ?Sized>(
    store: &S,
    hours: i64,
    now: DateTime<Utc>,
) -> Result<Vec<PersistedReading>, StorageError> {
    store.query(&TimeWindow::last_hours(now, hours))
}

/// Primary values of `reading`, or the insert error a store should return
pub(crate) fn require_complete(reading: &Reading) -> Result<PrimaryValues, StorageError> {
    reading
        .primary_values()
        .ok_or_else(|| StorageError::InsertFailed {
            reason: format!(
                "One or more sensor values are None: {}",
                reading
                    .missing_kinds()
                    .iter()
                    .map(|kind| kind.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::{CalibratedReading, SensorKind};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn complete(timestamp: DateTime<Utc>) -> Reading {
        let both = |v: f64| CalibratedReading {
            value: Some(v),
            percentage: Some(v),
            status: None,
        };
        Reading {
            timestamp,
            soil_moisture: both(40.0),
            air_temperature: both(20.0),
            air_flow: both(1.0),
            air_light: both(60.0),
        }
    }

    #[test]
    fn test_require_complete_lists_missing_kinds() {
        let mut reading = complete(now());
        reading.soil_moisture = CalibratedReading::none();
        reading.air_light = CalibratedReading::none();

        let err = require_complete(&reading).unwrap_err();
        assert_eq!(
            err,
            StorageError::InsertFailed {
                reason: "One or more sensor values are None: soil_moisture, air_light".to_string()
            }
        );
        assert_eq!(reading.missing_kinds(), vec![SensorKind::SoilMoisture, SensorKind::AirLight]);
    }

    #[test]
    fn test_shared_store_writes_through() {
        let shared = Arc::new(Mutex::new(MemoryStore::new()));
        let mut writer = Arc::clone(&shared);
        writer.store(&complete(now())).unwrap();

        let rows = recent(&shared, 1, now()).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_poisoned_shared_store() {
        let shared = Arc::new(Mutex::new(MemoryStore::new()));
        let poisoner = Arc::clone(&shared);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison the store lock");
        })
        .join();

        assert_eq!(
            recent(&shared, 1, now()).unwrap_err(),
            StorageError::LockPoisoned
        );
    }

    #[test]
    fn test_recent_excludes_older_rows() {
        let mut store = MemoryStore::new();
        store.store(&complete(now() - chrono::Duration::hours(2))).unwrap();
        store.store(&complete(now() - chrono::Duration::minutes(30))).unwrap();

        assert_eq!(recent(&store, 1, now()).unwrap().len(), 1);
        assert_eq!(recent(&store, 3, now()).unwrap().len(), 2);
    }
}
