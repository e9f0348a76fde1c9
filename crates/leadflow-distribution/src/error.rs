//! Error types for allocation

use thiserror::Error;

/// Errors that can occur while allocating a lead
#[derive(Error, Debug)]
pub enum AllocationError {
    /// Nobody is eligible and the rule does not fall back to manual
    #[error("Allocation exhausted for pipeline {pipeline_id}: no eligible members")]
    Exhausted {
        /// Pipeline that could not allocate
        pipeline_id: String,
    },

    /// Every compare-and-swap attempt lost to a concurrent writer
    #[error("Rotation cursor of pipeline {pipeline_id} still contended after {attempts} attempts")]
    Contention {
        /// Pipeline whose cursor is contended
        pipeline_id: String,
        /// Attempts made
        attempts: u32,
    },

    /// Storage layer error
    #[error("Storage error: {0}")]
    Store(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
