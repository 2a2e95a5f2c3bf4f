// MemoryStore - vector-backed ReadingStore
//
// Used for `--in-memory` runs and tests. Rows keep insertion order; queries
// sort by timestamp with a stable sort so equal timestamps stay in write order.

use crate::error::StorageError;
use crate::reading::{PersistedReading, Reading, TimeWindow};
use crate::storage::{require_complete, ReadingStore, StoreAck};

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    rows: Vec<PersistedReading>,
    next_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl ReadingStore for MemoryStore {
    fn store(&mut self, reading: &Reading) -> Result<StoreAck, StorageError> {
        let values = require_complete(reading)?;
        self.next_id += 1;
        self.rows.push(PersistedReading {
            id: self.next_id,
            timestamp: reading.timestamp,
            values,
        });
        Ok(StoreAck { id: self.next_id })
    }

    fn query(&self, window: &TimeWindow) -> Result<Vec<PersistedReading>, StorageError> {
        let mut rows: Vec<PersistedReading> = self
            .rows
            .iter()
            .filter(|row| window.contains(row.timestamp))
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.timestamp);
        Ok(rows)
    }
}
