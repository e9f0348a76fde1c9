//! Configuration for round-robin allocation

use crate::{AllocationError, WorkingHours};
use serde::{Deserialize, Serialize};

/// Configuration for the allocator
///
/// # Examples
///
/// ```
/// use leadflow_distribution::DistributionConfig;
///
/// let config = DistributionConfig::default();
/// assert_eq!(config.max_cas_retries, 8);
/// assert_eq!(config.max_attempts(), 9);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributionConfig {
    /// Business hours used by `working_hours_only` rules
    pub working_hours: WorkingHours,

    /// How many times a lost compare-and-swap is retried before giving up
    /// Default: 8
    pub max_cas_retries: u32,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            working_hours: WorkingHours::default(),
            max_cas_retries: 8,
        }
    }
}

impl DistributionConfig {
    /// Total compare-and-swap attempts per allocation
    pub fn max_attempts(&self) -> u32 {
        self.max_cas_retries.saturating_add(1)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), AllocationError> {
        self.working_hours.validate()
    }
}
