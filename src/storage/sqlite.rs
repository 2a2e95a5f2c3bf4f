use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::reading::{PersistedReading, PrimaryValues, Reading, TimeWindow};
use crate::storage::{require_complete, ReadingStore, StoreAck};

pub const SCHEMA_VERSION: i64 = 2;

struct Migration {
    version: i64,
    statements: &'static [&'static str],
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        statements: &[
            "CREATE TABLE IF NOT EXISTS sensor_data (\
                id INTEGER PRIMARY KEY AUTOINCREMENT,\
                timestamp_ms INTEGER NOT NULL,\
                soil_moisture REAL NOT NULL,\
                air_temp REAL NOT NULL,\
                air_flow REAL NOT NULL,\
                air_light REAL NOT NULL\
            );",
            "CREATE INDEX IF NOT EXISTS idx_sensor_data_timestamp ON sensor_data(timestamp_ms);",
        ],
    },
    Migration {
        version: 2,
        statements: &[
            "CREATE TABLE sensor_data_v2 (\
                id INTEGER PRIMARY KEY AUTOINCREMENT,\
                timestamp_ns INTEGER NOT NULL,\
                soil_moisture REAL NOT NULL,\
                air_temp REAL NOT NULL,\
                air_flow REAL NOT NULL,\
                air_light REAL NOT NULL\
            );",
            "INSERT INTO sensor_data_v2 (id, timestamp_ns, soil_moisture, air_temp, air_flow, air_light) \
             SELECT id, timestamp_ms * 1000000, soil_moisture, air_temp, air_flow, air_light FROM sensor_data;",
            "DROP TABLE sensor_data;",
            "ALTER TABLE sensor_data_v2 RENAME TO sensor_data;",
            "CREATE INDEX IF NOT EXISTS idx_sensor_data_timestamp_ns ON sensor_data(timestamp_ns);",
        ],
    },
];

const MEMORY_PATH: &str = ":memory:";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: PathBuf,
    pub wal_mode: bool,
    pub busy_timeout_ms: u64,
}

impl StorageConfig {
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            db_path: PathBuf::from(MEMORY_PATH),
            wal_mode: false,
            ..Self::default()
        }
    }

    fn is_memory(&self) -> bool {
        self.db_path.as_os_str() == MEMORY_PATH
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("field_logger.sqlite3"),
            wal_mode: true,
            busy_timeout_ms: 5_000,
        }
    }
}

/// `sensor_data` table in a SQLite database
pub struct SqliteStore {
    conn: Connection,
    config: StorageConfig,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("path", &self.config.db_path)
            .field("wal_mode", &self.config.wal_mode)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    pub fn open(config: StorageConfig) -> Result<Self, StorageError> {
        tracing::debug!(
            target: "field_logger.storage",
            path = %config.db_path.display(),
            wal_mode = config.wal_mode,
            busy_timeout_ms = config.busy_timeout_ms,
            "opening reading store"
        );

        let open_failed = |err: rusqlite::Error| StorageError::OpenFailed {
            path: config.db_path.display().to_string(),
            reason: err.to_string(),
        };
        let mut conn = if config.is_memory() {
            Connection::open_in_memory()
        } else {
            Connection::open(&config.db_path)
        }
        .map_err(open_failed)?;

        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))
            .map_err(open_failed)?;
        if config.wal_mode && !config.is_memory() {
            let mode: String = conn
                .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
                .map_err(open_failed)?;
            if !mode.eq_ignore_ascii_case("wal") {
                log::warn!("[SqliteStore] journal_mode=WAL not accepted, using {}", mode);
            }
        }

        bootstrap(&mut conn)?;
        log::info!(
            "[SqliteStore] ready at {} (schema v{})",
            config.db_path.display(),
            SCHEMA_VERSION
        );

        Ok(Self { conn, config })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::open(StorageConfig::in_memory())
    }

    #[must_use]
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Number of stored rows
    pub fn count(&self) -> Result<u64, StorageError> {
        self.conn
            .query_row("SELECT COUNT(*) FROM sensor_data", [], |row| {
                row.get::<_, i64>(0)
            })
            .map(|count| count.max(0) as u64)
            .map_err(query_failed)
    }
}

impl ReadingStore for SqliteStore {
    fn store(&mut self, reading: &Reading) -> Result<StoreAck, StorageError> {
        let values = require_complete(reading)?;
        let timestamp_ns = reading.timestamp.timestamp_nanos_opt().ok_or_else(|| {
            StorageError::InsertFailed {
                reason: format!("timestamp {} is outside the storable range", reading.timestamp),
            }
        })?;
        self.conn
            .execute(
                "INSERT INTO sensor_data (timestamp_ns, soil_moisture, air_temp, air_flow, air_light) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    timestamp_ns,
                    values.soil_moisture,
                    values.air_temp,
                    values.air_flow,
                    values.air_light
                ],
            )
            .map_err(|err| StorageError::InsertFailed {
                reason: err.to_string(),
            })?;

        let id = self.conn.last_insert_rowid();
        tracing::trace!(target: "field_logger.storage", id, "reading stored");
        Ok(StoreAck { id })
    }

    fn query(&self, window: &TimeWindow) -> Result<Vec<PersistedReading>, StorageError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, timestamp_ns, soil_moisture, air_temp, air_flow, air_light \
                 FROM sensor_data \
                 WHERE timestamp_ns >= ?1 AND timestamp_ns <= ?2 \
                 ORDER BY timestamp_ns ASC, id ASC",
            )
            .map_err(query_failed)?;

        let rows = stmt
            .query_map(
                params![bound_nanos(window.start), bound_nanos(window.end)],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        PrimaryValues {
                            soil_moisture: row.get(2)?,
                            air_temp: row.get(3)?,
                            air_flow: row.get(4)?,
                            air_light: row.get(5)?,
                        },
                    ))
                },
            )
            .map_err(query_failed)?;

        let mut readings = Vec::new();
        for row in rows {
            let (id, timestamp_ns, values) = row.map_err(query_failed)?;
            readings.push(PersistedReading {
                id,
                timestamp: Utc.timestamp_nanos(timestamp_ns),
                values,
            });
        }
        Ok(readings)
    }
}

/// Window bound in epoch nanoseconds, clamped to what a row can hold
fn bound_nanos(at: DateTime<Utc>) -> i64 {
    match at.timestamp_nanos_opt() {
        Some(nanos) => nanos,
        None if at.timestamp() < 0 => i64::MIN,
        None => i64::MAX,
    }
}

fn query_failed(err: rusqlite::Error) -> StorageError {
    StorageError::QueryFailed {
        reason: err.to_string(),
    }
}

fn schema_failed(err: rusqlite::Error) -> StorageError {
    StorageError::Schema {
        reason: err.to_string(),
    }
}

/// Apply pending migrations, tracking progress in `PRAGMA user_version`
fn bootstrap(conn: &mut Connection) -> Result<(), StorageError> {
    let current: i64 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(schema_failed)?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        let tx = conn.transaction().map_err(schema_failed)?;
        for statement in migration.statements {
            tx.execute_batch(statement).map_err(schema_failed)?;
        }
        tx.pragma_update(None, "user_version", migration.version)
            .map_err(schema_failed)?;
        tx.commit().map_err(schema_failed)?;
        log::debug!("[SqliteStore] applied schema migration v{}", migration.version);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::CalibratedReading;
    use crate::storage::MemoryStore;
    use chrono::Duration as TimeDelta;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn complete(secs: i64, soil: f64) -> Reading {
        let percent = |p: f64| CalibratedReading {
            value: None,
            percentage: Some(p),
            status: Some("Moderate".to_string()),
        };
        let value = |v: f64| CalibratedReading {
            value: Some(v),
            percentage: None,
            status: None,
        };
        Reading {
            timestamp: ts(secs),
            soil_moisture: percent(soil),
            air_temperature: value(22.5),
            air_flow: value(3.75),
            air_light: percent(36.0),
        }
    }

    #[test]
    fn test_bootstrap_sets_schema_version() {
        let store = SqliteStore::open_in_memory().unwrap();
        let version: i64 = store
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_millisecond_rows_upgrade_to_nanoseconds() {
        let mut conn = Connection::open_in_memory().unwrap();
        let tx = conn.transaction().unwrap();
        for statement in MIGRATIONS[0].statements {
            tx.execute_batch(statement).unwrap();
        }
        tx.pragma_update(None, "user_version", 1).unwrap();
        tx.commit().unwrap();
        conn.execute(
            "INSERT INTO sensor_data (timestamp_ms, soil_moisture, air_temp, air_flow, air_light) \
             VALUES (?1, 10.0, 22.5, 3.75, 36.0)",
            params![1_700_000_000_123i64],
        )
        .unwrap();

        bootstrap(&mut conn).unwrap();
        let store = SqliteStore {
            conn,
            config: StorageConfig::in_memory(),
        };
        let rows = store.query(&TimeWindow::new(ts(-1), ts(1))).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].timestamp,
            Utc.timestamp_millis_opt(1_700_000_000_123).unwrap()
        );
    }

    #[test]
    fn test_bootstrap_is_idempotent() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        bootstrap(&mut store.conn).unwrap();
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_store_and_query_roundtrip() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let ack = store.store(&complete(5, 42.5)).unwrap();

        let rows = store.query(&TimeWindow::new(ts(0), ts(10))).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, ack.id);
        assert_eq!(rows[0].timestamp, ts(5));
        assert_eq!(rows[0].values.soil_moisture, 42.5);
        assert_eq!(rows[0].values.air_temp, 22.5);
        assert_eq!(rows[0].values.air_flow, 3.75);
        assert_eq!(rows[0].values.air_light, 36.0);
    }

    #[test]
    fn test_query_is_ascending_and_bounded() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        for (secs, soil) in [(300, 3.0), (100, 1.0), (200, 2.0), (900, 9.0)] {
            store.store(&complete(secs, soil)).unwrap();
        }

        let rows = store.query(&TimeWindow::new(ts(100), ts(300))).unwrap();
        let soils: Vec<f64> = rows.iter().map(|r| r.values.soil_moisture).collect();
        assert_eq!(soils, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_incomplete_reading_not_inserted() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mut reading = complete(0, 10.0);
        reading.air_temperature = CalibratedReading::none();

        assert!(matches!(
            store.store(&reading),
            Err(StorageError::InsertFailed { .. })
        ));
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_millisecond_timestamps_survive() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mut reading = complete(0, 10.0);
        reading.timestamp = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        store.store(&reading).unwrap();

        let rows = store.query(&TimeWindow::new(ts(-1), ts(1))).unwrap();
        assert_eq!(rows[0].timestamp, reading.timestamp);
    }

    #[test]
    fn test_sub_millisecond_window_matches_memory_store() {
        let start = ts(0);
        let mut reading = complete(0, 10.0);
        reading.timestamp = start + TimeDelta::microseconds(900);
        let narrow = TimeWindow::new(start, start + TimeDelta::microseconds(100));
        let wide = TimeWindow::new(start, start + TimeDelta::microseconds(900));

        let mut sqlite = SqliteStore::open_in_memory().unwrap();
        let mut memory = MemoryStore::new();
        sqlite.store(&reading).unwrap();
        memory.store(&reading).unwrap();

        assert!(sqlite.query(&narrow).unwrap().is_empty());
        assert!(memory.query(&narrow).unwrap().is_empty());

        let rows = sqlite.query(&wide).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].timestamp, reading.timestamp);
        assert_eq!(memory.query(&wide).unwrap().len(), 1);
    }

    #[test]
    fn test_unbounded_window_and_unstorable_timestamp() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.store(&complete(5, 10.0)).unwrap();

        let everything = TimeWindow::last_hours(ts(10), i64::MAX);
        assert_eq!(store.query(&everything).unwrap().len(), 1);

        let mut ancient = complete(0, 10.0);
        ancient.timestamp = DateTime::<Utc>::MIN_UTC;
        assert!(matches!(
            store.store(&ancient),
            Err(StorageError::InsertFailed { .. })
        ));
        assert_eq!(store.count().unwrap(), 1);
    }
}
