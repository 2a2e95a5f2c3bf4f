// Storage error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Storage error code constants
///
/// Error code range: 2001-2005
pub struct StorageErrorCodes {}

impl StorageErrorCodes {
    /// Database could not be opened
    pub const OPEN_FAILED: i32 = 2001;

    /// Schema bootstrap failed
    pub const SCHEMA: i32 = 2002;

    /// Insert of a reading failed
    pub const INSERT_FAILED: i32 = 2003;

    /// History query failed
    pub const QUERY_FAILED: i32 = 2004;

    /// Store mutex was poisoned
    pub const LOCK_POISONED: i32 = 2005;
}

/// Log a storage error with structured context
pub fn log_storage_error(err: &StorageError, context: &str) {
    error!(
        "Storage error in {}: code={}, component=ReadingStore, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Persistence sink errors
///
/// These are always treated as transient by the poll controller: the
/// reading is reported and dropped, never retried within the cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageError {
    /// Failed to open the database
    OpenFailed { path: String, reason: String },

    /// Failed to create tables or indexes
    Schema { reason: String },

    /// Failed to insert a reading
    InsertFailed { reason: String },

    /// Failed to run a history query
    QueryFailed { reason: String },

    /// Store lock was poisoned
    LockPoisoned,
}

impl ErrorCode for StorageError {
    fn code(&self) -> i32 {
        match self {
            StorageError::OpenFailed { .. } => StorageErrorCodes::OPEN_FAILED,
            StorageError::Schema { .. } => StorageErrorCodes::SCHEMA,
            StorageError::InsertFailed { .. } => StorageErrorCodes::INSERT_FAILED,
            StorageError::QueryFailed { .. } => StorageErrorCodes::QUERY_FAILED,
            StorageError::LockPoisoned => StorageErrorCodes::LOCK_POISONED,
        }
    }

    fn message(&self) -> String {
        match self {
            StorageError::OpenFailed { path, reason } => {
                format!("Failed to open database {}: {}", path, reason)
            }
            StorageError::Schema { reason } => format!("Schema bootstrap failed: {}", reason),
            StorageError::InsertFailed { reason } => {
                format!("Error writing to database: {}", reason)
            }
            StorageError::QueryFailed { reason } => {
                format!("Error fetching historical data: {}", reason)
            }
            StorageError::LockPoisoned => "Store lock poisoned".to_string(),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StorageError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for StorageError {}
