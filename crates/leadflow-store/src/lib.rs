//! Leadflow Storage Layer
//!
//! Implements the domain's store and registry traits on SQLite.
//!
//! # Architecture
//!
//! - `leads` and `lead_stage_history` for the lead records
//! - `pipelines`, `pipeline_stages`, `pipeline_members` for the registry
//! - `distribution_rules` holding the persisted rotation cursor, advanced
//!   with a compare-and-swap `UPDATE` so several service instances can share
//!   one database
//! - `forms`, `scoring_rules`, `form_required_fields` for form definitions
//!
//! # Examples
//!
//! ```no_run
//! use leadflow_store::SqliteStore;
//!
//! let store = SqliteStore::new(":memory:").unwrap();
//! // Store is now ready for lead operations
//! ```

#![warn(missing_docs)]

mod catalog;
mod leads;

use leadflow_domain::LeadId;
use rusqlite::{Connection, ErrorCode};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Referenced record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid data format
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Unique constraint violated
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// Connection mutex poisoned by a panicking writer
    #[error("Store lock poisoned")]
    Poisoned,
}

impl StoreError {
    /// Map constraint violations to [`StoreError::Duplicate`]
    fn from_write(e: rusqlite::Error, what: &str) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(failure, _) if failure.code == ErrorCode::ConstraintViolation => {
                StoreError::Duplicate(format!("{}: {}", what, e))
            }
            _ => StoreError::Database(e),
        }
    }
}

/// SQLite-based implementation of the lead store and registries
///
/// # Thread Safety
///
/// The connection sits behind a mutex, so one `SqliteStore` can be shared
/// (e.g. in an `Arc`) by concurrent intake tasks. Every trait method holds
/// the lock for the duration of a single statement or transaction.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Create a new SqliteStore with the given database path
    ///
    /// Use `:memory:` for an in-memory database (useful for testing).
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use leadflow_store::SqliteStore;
    ///
    /// let store = SqliteStore::new("leadflow.db").unwrap();
    /// ```
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self { conn: Mutex::new(conn) };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Initialize the database schema
    fn initialize_schema(&self) -> Result<(), StoreError> {
        let schema = include_str!("schema.sql");
        self.lock()?.execute_batch(schema)?;
        Ok(())
    }

    /// Check that the database answers
    pub fn ping(&self) -> Result<(), StoreError> {
        self.lock()?.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Convert LeadId to bytes for storage
    fn lead_id_to_bytes(id: LeadId) -> Vec<u8> {
        id.value().to_be_bytes().to_vec()
    }

    /// Convert bytes to LeadId
    fn bytes_to_lead_id(bytes: &[u8]) -> Result<LeadId, StoreError> {
        if bytes.len() != 16 {
            return Err(StoreError::InvalidData(format!(
                "Expected 16 bytes for LeadId, got {}",
                bytes.len()
            )));
        }
        let mut arr = [0u8; 16];
        arr.copy_from_slice(bytes);
        Ok(LeadId::from_value(u128::from_be_bytes(arr)))
    }
}

/// Wrap a conversion failure so it can be returned from a row closure
fn conversion_error(column: usize, kind: rusqlite::types::Type, e: StoreError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, kind, Box::new(e))
}
