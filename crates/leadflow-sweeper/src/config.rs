//! Configuration for the temperature sweep

use crate::SweeperError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the sweeper
///
/// # Examples
///
/// ```
/// use leadflow_sweeper::SweeperConfig;
///
/// let config = SweeperConfig::default();
/// assert_eq!(config.sweep_interval_minutes, 15);
///
/// // Frequent sweeps for busy pipelines
/// let config = SweeperConfig::aggressive();
/// assert_eq!(config.sweep_interval_minutes, 5);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweeperConfig {
    /// How often to run the sweep (in minutes)
    /// Default: 15
    pub sweep_interval_minutes: u64,

    /// Log the tiers that would change without writing them
    /// Default: false
    pub dry_run: bool,

    /// Leads read from the store per page
    /// Default: 500
    pub batch_limit: usize,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            sweep_interval_minutes: 15,
            dry_run: false,
            batch_limit: 500,
        }
    }
}

impl SweeperConfig {
    /// Sweep every 5 minutes in large pages
    ///
    /// Keeps stored tags close to the computed tier, at the cost of more
    /// store traffic.
    pub fn aggressive() -> Self {
        Self {
            sweep_interval_minutes: 5,
            dry_run: false,
            batch_limit: 1000,
        }
    }

    /// Sweep hourly in small pages
    pub fn lenient() -> Self {
        Self {
            sweep_interval_minutes: 60,
            dry_run: false,
            batch_limit: 200,
        }
    }

    /// Get sweep interval as Duration
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_minutes.saturating_mul(60))
    }

    /// Check that the interval and page size are usable
    pub fn validate(&self) -> Result<(), SweeperError> {
        if self.sweep_interval_minutes == 0 {
            return Err(SweeperError::Config(
                "sweep_interval_minutes must be greater than zero".to_string(),
            ));
        }
        if self.batch_limit == 0 {
            return Err(SweeperError::Config("batch_limit must be greater than zero".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SweeperConfig::default();
        assert_eq!(config.sweep_interval_minutes, 15);
        assert!(!config.dry_run);
        assert_eq!(config.batch_limit, 500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets() {
        let aggressive = SweeperConfig::aggressive();
        let lenient = SweeperConfig::lenient();
        assert!(aggressive.sweep_interval() < SweeperConfig::default().sweep_interval());
        assert!(lenient.sweep_interval() > SweeperConfig::default().sweep_interval());
        assert!(aggressive.validate().is_ok());
        assert!(lenient.validate().is_ok());
    }

    #[test]
    fn test_sweep_interval() {
        let config = SweeperConfig::default();
        assert_eq!(config.sweep_interval(), Duration::from_secs(15 * 60));
    }

    #[test]
    fn test_validate_rejects_zero() {
        let config = SweeperConfig {
            sweep_interval_minutes: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(SweeperError::Config(_))));

        let config = SweeperConfig {
            batch_limit: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml() {
        let config: SweeperConfig = toml::from_str("dry_run = true").unwrap();
        assert!(config.dry_run);
        assert_eq!(config.sweep_interval_minutes, 15);
        assert_eq!(config.batch_limit, 500);
    }
}
