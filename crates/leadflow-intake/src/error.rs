//! Error types for intake operations

use leadflow_distribution::AllocationError;
use thiserror::Error;

/// Errors that can occur during intake
#[derive(Error, Debug)]
pub enum IntakeError {
    /// The submission was rejected; no lead was created
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// Lead not found
    #[error("Lead not found: {0}")]
    NotFound(String),

    /// Stage does not belong to the lead's pipeline
    #[error("Stage {stage_id} is not part of pipeline {pipeline_id}")]
    InvalidStage {
        /// Requested stage
        stage_id: String,
        /// Pipeline of the lead
        pipeline_id: String,
    },

    /// Stage move dated before the lead entered its current stage
    #[error("Stage move at {at} precedes current stage entry at {current}")]
    StageTimeRegression {
        /// Requested move time (ms since epoch)
        at: u64,
        /// Entry time of the current stage (ms since epoch)
        current: u64,
    },

    /// The lead could not be written
    #[error("Persistence failed after {attempts} attempts: {message}")]
    Persistence {
        /// Write attempts made
        attempts: u32,
        /// Last store error
        message: String,
    },

    /// Storage layer error outside the lead write
    #[error("Storage error: {0}")]
    Store(String),

    /// Allocation failed for a reason other than exhaustion
    #[error("Allocation error: {0}")]
    Allocation(#[from] AllocationError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors returned by external collaborators
///
/// These never leave intake: side effects log them and move on.
#[derive(Error, Debug)]
pub enum CollaboratorError {
    /// Network communication error
    #[error("Network error: {0}")]
    Network(String),

    /// Remote service answered with an error status
    #[error("API error {0}: {1}")]
    Api(u16, String),

    /// Failed to parse the response
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for CollaboratorError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            CollaboratorError::Parse(e.to_string())
        } else {
            CollaboratorError::Network(e.to_string())
        }
    }
}
