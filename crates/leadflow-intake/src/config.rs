//! Configuration for intake

use crate::IntakeError;
use leadflow_domain::{SourceNameTable, TemperatureThresholds, TemperatureTier, DEFAULT_MQL_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Upper bound for `persistence_attempts`
pub const MAX_PERSISTENCE_ATTEMPTS: u32 = 10;

/// Qualification settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualificationRules {
    /// Score at or above which a lead is marketing qualified
    /// Default: 70
    pub mql_threshold: u32,
}

impl Default for QualificationRules {
    fn default() -> Self {
        Self {
            mql_threshold: DEFAULT_MQL_THRESHOLD,
        }
    }
}

/// Configuration for the intake coordinator
///
/// # Examples
///
/// ```
/// use leadflow_intake::IntakeConfig;
///
/// let config = IntakeConfig::default();
/// assert_eq!(config.qualification_rules.mql_threshold, 70);
/// assert_eq!(config.persistence_attempts, 3);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeConfig {
    /// Qualification settings
    pub qualification_rules: QualificationRules,

    /// Friendly names for `utm_source` values, merged over the built-in table
    pub source_names: HashMap<String, String>,

    /// Write attempts for a new lead before giving up, at most 10
    /// Default: 3
    pub persistence_attempts: u32,

    /// Upper bound for each best-effort side effect (milliseconds)
    /// Default: 5000
    pub side_effect_timeout_ms: u64,

    /// Webhook receiving new-lead notifications
    pub notification_webhook: Option<String>,

    /// Base URL of the IP geo lookup service
    pub geo_lookup_url: Option<String>,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            qualification_rules: QualificationRules::default(),
            source_names: HashMap::new(),
            persistence_attempts: 3,
            side_effect_timeout_ms: 5_000,
            notification_webhook: None,
            geo_lookup_url: None,
        }
    }
}

impl IntakeConfig {
    /// Side-effect timeout as a Duration
    pub fn side_effect_timeout(&self) -> Duration {
        Duration::from_millis(self.side_effect_timeout_ms)
    }

    /// Built-in source names extended with the configured ones
    pub fn source_name_table(&self) -> SourceNameTable {
        let mut table = SourceNameTable::builtin();
        for (source, name) in &self.source_names {
            table.insert(source, name.clone());
        }
        table
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), IntakeError> {
        if self.persistence_attempts == 0 {
            return Err(IntakeError::Config(
                "persistence_attempts must be greater than 0".to_string(),
            ));
        }
        if self.persistence_attempts > MAX_PERSISTENCE_ATTEMPTS {
            return Err(IntakeError::Config(format!(
                "persistence_attempts must be at most {} (got {})",
                MAX_PERSISTENCE_ATTEMPTS, self.persistence_attempts
            )));
        }
        if self.side_effect_timeout_ms == 0 {
            return Err(IntakeError::Config(
                "side_effect_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.qualification_rules.mql_threshold > 100 {
            return Err(IntakeError::Config(format!(
                "mql_threshold must be at most 100 (got {})",
                self.qualification_rules.mql_threshold
            )));
        }
        for (key, url) in [
            ("notification_webhook", &self.notification_webhook),
            ("geo_lookup_url", &self.geo_lookup_url),
        ] {
            if let Some(url) = url {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(IntakeError::Config(format!("{} must be an http(s) URL: {}", key, url)));
                }
            }
        }
        Ok(())
    }
}

/// One row of the temperature threshold table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdEntry {
    /// Upper bound (exclusive) of dwell time for this tier, in hours
    pub max_elapsed_hours: u64,
    /// Tier name: hot, warm or cold
    pub tier: String,
}

/// Temperature classification settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemperatureConfig {
    /// Ascending threshold table; anything past the last entry is frozen
    pub thresholds: Vec<ThresholdEntry>,
}

impl Default for TemperatureConfig {
    /// hot < 2h, warm < 24h, cold < 72h
    fn default() -> Self {
        let entry = |hours, tier: &str| ThresholdEntry {
            max_elapsed_hours: hours,
            tier: tier.to_string(),
        };
        Self {
            thresholds: vec![entry(2, "hot"), entry(24, "warm"), entry(72, "cold")],
        }
    }
}

impl TemperatureConfig {
    /// Build the validated threshold table
    pub fn thresholds(&self) -> Result<TemperatureThresholds, IntakeError> {
        let entries = self
            .thresholds
            .iter()
            .map(|entry| {
                let tier: TemperatureTier = entry.tier.parse().map_err(IntakeError::Config)?;
                let max_elapsed = entry
                    .max_elapsed_hours
                    .checked_mul(3600)
                    .map(Duration::from_secs)
                    .ok_or_else(|| IntakeError::Config(format!("threshold too large: {}h", entry.max_elapsed_hours)))?;
                Ok((max_elapsed, tier))
            })
            .collect::<Result<Vec<_>, IntakeError>>()?;

        TemperatureThresholds::new(entries).map_err(IntakeError::Config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = IntakeConfig::default();
        assert_eq!(config.qualification_rules.mql_threshold, 70);
        assert_eq!(config.side_effect_timeout(), Duration::from_secs(5));
        assert!(config.notification_webhook.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let config = IntakeConfig {
            persistence_attempts: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = IntakeConfig {
            persistence_attempts: 64,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = IntakeConfig {
            persistence_attempts: MAX_PERSISTENCE_ATTEMPTS,
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        let config = IntakeConfig {
            qualification_rules: QualificationRules { mql_threshold: 101 },
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = IntakeConfig {
            geo_lookup_url: Some("ftp://geo".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_source_names_override_builtin() {
        let mut config = IntakeConfig::default();
        config.source_names.insert("Google".to_string(), "Google Search".to_string());
        config.source_names.insert("newsletter".to_string(), "Newsletter".to_string());

        let table = config.source_name_table();
        assert_eq!(table.lookup("google"), Some("Google Search"));
        assert_eq!(table.lookup("newsletter"), Some("Newsletter"));
        assert_eq!(table.lookup("facebook"), Some("Facebook Ads"));
    }

    #[test]
    fn test_default_thresholds_match_domain() {
        let thresholds = TemperatureConfig::default().thresholds().unwrap();
        assert_eq!(thresholds, TemperatureThresholds::default());
    }

    #[test]
    fn test_thresholds_from_toml() {
        let config: TemperatureConfig = toml::from_str(
            r#"
            thresholds = [
                { max_elapsed_hours = 1, tier = "hot" },
                { max_elapsed_hours = 48, tier = "cold" },
            ]
            "#,
        )
        .unwrap();

        let thresholds = config.thresholds().unwrap();
        assert_eq!(thresholds.classify(Duration::from_secs(2 * 3600)), TemperatureTier::Cold);
        assert_eq!(thresholds.classify(Duration::from_secs(50 * 3600)), TemperatureTier::Frozen);
    }

    #[test]
    fn test_invalid_thresholds() {
        let bad_tier = TemperatureConfig {
            thresholds: vec![ThresholdEntry {
                max_elapsed_hours: 1,
                tier: "lukewarm".to_string(),
            }],
        };
        assert!(matches!(bad_tier.thresholds(), Err(IntakeError::Config(_))));

        let descending = TemperatureConfig {
            thresholds: vec![
                ThresholdEntry {
                    max_elapsed_hours: 24,
                    tier: "hot".to_string(),
                },
                ThresholdEntry {
                    max_elapsed_hours: 2,
                    tier: "warm".to_string(),
                },
            ],
        };
        assert!(descending.thresholds().is_err());

        let empty = TemperatureConfig { thresholds: vec![] };
        assert!(empty.thresholds().is_err());
    }
}
