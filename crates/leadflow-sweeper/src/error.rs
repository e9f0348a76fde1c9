//! Error types for sweep operations

use thiserror::Error;

/// Errors that can occur while sweeping
#[derive(Error, Debug)]
pub enum SweeperError {
    /// Storage layer error
    #[error("Storage error: {0}")]
    Store(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
