//! Configuration file parsing for the server.
//!
//! One TOML file holds the bind address, the database path, the engine
//! settings of every crate and the catalog (pipelines and forms) seeded at
//! start-up.

use leadflow_distribution::DistributionConfig;
use leadflow_domain::{
    Condition, CustomSource, DistributionMode, DistributionRule, FormDefinition, Pipeline, PipelineMember,
    ScoringRule, TrackingMode,
};
use leadflow_intake::{IntakeConfig, TemperatureConfig};
use leadflow_sweeper::SweeperConfig;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// Server configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// A value is out of range or inconsistent
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Server configuration loaded from TOML
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener and database settings
    pub server: ServerSection,

    /// Intake settings
    pub intake: IntakeConfig,

    /// Round-robin settings
    pub distribution: DistributionConfig,

    /// Temperature threshold table
    pub temperature: TemperatureConfig,

    /// Background sweep settings
    pub sweeper: SweeperConfig,

    /// Pipelines to seed
    pub pipelines: Vec<PipelineConfig>,

    /// Forms to seed
    pub forms: Vec<FormConfig>,
}

/// `[server]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Bind address (e.g., "127.0.0.1")
    pub bind_address: String,

    /// Bind port (e.g., 8080)
    pub bind_port: u16,

    /// SQLite database file (":memory:" for a throwaway store)
    pub database_path: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            bind_port: 8080,
            database_path: "leadflow.db".to_string(),
        }
    }
}

/// `[[pipelines]]` entry
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline identifier
    pub id: String,

    /// Display name
    pub name: String,

    /// Ordered stage ids; the first one is the initial stage
    pub stages: Vec<String>,

    /// Members receiving leads
    #[serde(default)]
    pub members: Vec<MemberConfig>,

    /// Assignment rule; without one leads stay unassigned
    #[serde(default)]
    pub distribution_rule: Option<DistributionRuleConfig>,
}

/// `[[pipelines.members]]` entry
#[derive(Debug, Clone, Deserialize)]
pub struct MemberConfig {
    /// Member identifier
    pub id: String,

    /// Whether the member takes part in the rotation
    #[serde(default = "default_true")]
    pub active: bool,

    /// Rotation position; defaults to the position in the list
    #[serde(default)]
    pub join_order: Option<u32>,
}

/// `[pipelines.distribution_rule]` table
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DistributionRuleConfig {
    /// "manual" or "round_robin"
    pub mode: String,
    /// Rule switch
    pub is_active: bool,
    /// Leave inactive members out of the rotation
    pub skip_inactive_members: bool,
    /// Leave the lead unassigned instead of failing when nobody is eligible
    pub fallback_to_manual: bool,
    /// Only rotate during `[distribution.working_hours]`
    pub working_hours_only: bool,
}

impl Default for DistributionRuleConfig {
    fn default() -> Self {
        Self {
            mode: DistributionMode::RoundRobin.as_str().to_string(),
            is_active: true,
            skip_inactive_members: true,
            fallback_to_manual: true,
            working_hours_only: false,
        }
    }
}

/// `[[forms]]` entry
#[derive(Debug, Clone, Deserialize)]
pub struct FormConfig {
    /// Form identifier
    pub id: String,

    /// Display name, also the origin in "form" tracking mode
    pub name: String,

    /// Pipeline receiving the leads
    pub pipeline_id: String,

    /// Attribution settings
    #[serde(default)]
    pub lead_tracking: LeadTrackingConfig,

    /// Scoring rules, evaluated in order
    #[serde(default)]
    pub scoring_rules: Vec<ScoringRuleConfig>,

    /// Fields that must be present and non-empty
    #[serde(default)]
    pub required_fields: Vec<String>,

    /// Per-form MQL threshold overriding `intake.qualification_rules`
    #[serde(default)]
    pub mql_threshold: Option<u32>,
}

/// `[forms.lead_tracking]` table
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LeadTrackingConfig {
    /// "utm", "custom", "form" or "disabled"
    pub lead_source: String,
    /// Origin name in "custom" mode
    pub custom_source_name: Option<String>,
    /// Source label in "custom" mode
    pub custom_source: Option<String>,
    /// Medium label in "custom" mode
    pub custom_medium: Option<String>,
    /// Campaign label in "custom" mode
    pub custom_campaign: Option<String>,
}

impl Default for LeadTrackingConfig {
    fn default() -> Self {
        Self {
            lead_source: "disabled".to_string(),
            custom_source_name: None,
            custom_source: None,
            custom_medium: None,
            custom_campaign: None,
        }
    }
}

/// `[[forms.scoring_rules]]` entry
#[derive(Debug, Clone, Deserialize)]
pub struct ScoringRuleConfig {
    /// Field the rule reads
    pub field_id: String,
    /// equals, contains, greater_than, less_than, not_empty or range
    pub condition: String,
    /// Comparison value; "min,max" for range
    #[serde(default)]
    pub value: String,
    /// Points awarded on a match
    pub points: u32,
}

fn default_true() -> bool {
    true
}

impl ServerConfig {
    /// Load and validate configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Create a configuration for tests: in-memory store, one pipeline
    /// with two members and one contact form
    pub fn default_test_config() -> Self {
        let mut config = Self::default();
        config.server.database_path = ":memory:".to_string();
        config.pipelines = vec![PipelineConfig {
            id: "sales".to_string(),
            name: "Sales".to_string(),
            stages: vec!["new".to_string(), "contacted".to_string(), "won".to_string()],
            members: vec![
                MemberConfig {
                    id: "alice".to_string(),
                    active: true,
                    join_order: None,
                },
                MemberConfig {
                    id: "bob".to_string(),
                    active: true,
                    join_order: None,
                },
            ],
            distribution_rule: Some(DistributionRuleConfig::default()),
        }];
        config.forms = vec![FormConfig {
            id: "contact".to_string(),
            name: "Contact us".to_string(),
            pipeline_id: "sales".to_string(),
            lead_tracking: LeadTrackingConfig {
                lead_source: "utm".to_string(),
                ..Default::default()
            },
            scoring_rules: vec![
                ScoringRuleConfig {
                    field_id: "budget".to_string(),
                    condition: "greater_than".to_string(),
                    value: "1000".to_string(),
                    points: 50,
                },
                ScoringRuleConfig {
                    field_id: "email".to_string(),
                    condition: "not_empty".to_string(),
                    value: String::new(),
                    points: 20,
                },
            ],
            required_fields: vec!["email".to_string()],
            mql_threshold: None,
        }];
        config
    }

    /// Get the full bind address (address:port)
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.bind_address, self.server.bind_port)
    }

    /// Check every section and the catalog for consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.database_path.trim().is_empty() {
            return Err(ConfigError::Invalid("server.database_path must not be empty".to_string()));
        }
        self.intake
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.distribution
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.temperature
            .thresholds()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.sweeper
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let mut pipeline_ids = HashSet::new();
        for pipeline in &self.pipelines {
            if !pipeline_ids.insert(pipeline.id.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate pipeline id: {}", pipeline.id)));
            }
            pipeline.to_pipeline()?;
            pipeline.to_members()?;
            pipeline.to_rule()?;
        }

        let mut form_ids = HashSet::new();
        for form in &self.forms {
            if !form_ids.insert(form.id.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate form id: {}", form.id)));
            }
            if !pipeline_ids.contains(form.pipeline_id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "form {} references unknown pipeline {}",
                    form.id, form.pipeline_id
                )));
            }
            form.to_definition()?;
        }

        Ok(())
    }
}

impl PipelineConfig {
    /// Build the domain pipeline
    pub fn to_pipeline(&self) -> Result<Pipeline, ConfigError> {
        Pipeline::new(self.id.clone(), self.name.clone(), self.stages.clone())
            .map_err(|e| ConfigError::Invalid(format!("pipeline {}: {}", self.id, e)))
    }

    /// Build the member list, filling in missing join orders
    pub fn to_members(&self) -> Result<Vec<PipelineMember>, ConfigError> {
        let mut seen = HashSet::new();
        self.members
            .iter()
            .enumerate()
            .map(|(position, member)| {
                if member.id.trim().is_empty() {
                    return Err(ConfigError::Invalid(format!("pipeline {}: empty member id", self.id)));
                }
                if !seen.insert(member.id.as_str()) {
                    return Err(ConfigError::Invalid(format!(
                        "pipeline {}: duplicate member {}",
                        self.id, member.id
                    )));
                }
                let join_order = member.join_order.unwrap_or(position as u32);
                Ok(PipelineMember::new(member.id.clone(), member.active, join_order))
            })
            .collect()
    }

    /// Build the distribution rule, if one is configured
    pub fn to_rule(&self) -> Result<Option<DistributionRule>, ConfigError> {
        let Some(rule) = &self.distribution_rule else {
            return Ok(None);
        };

        let mode = DistributionMode::parse(&rule.mode).ok_or_else(|| {
            ConfigError::Invalid(format!("pipeline {}: unknown distribution mode {}", self.id, rule.mode))
        })?;

        Ok(Some(DistributionRule {
            pipeline_id: self.id.clone(),
            mode,
            is_active: rule.is_active,
            skip_inactive_members: rule.skip_inactive_members,
            fallback_to_manual: rule.fallback_to_manual,
            working_hours_only: rule.working_hours_only,
            rotation_cursor: 0,
        }))
    }
}

impl FormConfig {
    /// Build the domain form definition
    pub fn to_definition(&self) -> Result<FormDefinition, ConfigError> {
        if let Some(threshold) = self.mql_threshold {
            if threshold > 100 {
                return Err(ConfigError::Invalid(format!(
                    "form {}: mql_threshold must be at most 100 (got {})",
                    self.id, threshold
                )));
            }
        }

        let scoring_rules = self
            .scoring_rules
            .iter()
            .map(|rule| {
                let condition = Condition::parse(&rule.condition).ok_or_else(|| {
                    ConfigError::Invalid(format!("form {}: unknown condition {}", self.id, rule.condition))
                })?;
                Ok(ScoringRule::new(rule.field_id.clone(), condition, rule.value.clone(), rule.points))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(FormDefinition {
            id: self.id.clone(),
            name: self.name.clone(),
            pipeline_id: self.pipeline_id.clone(),
            tracking: self.lead_tracking.to_mode(&self.id)?,
            scoring_rules,
            mql_threshold: self.mql_threshold,
            required_fields: self.required_fields.clone(),
        })
    }
}

impl LeadTrackingConfig {
    fn to_mode(&self, form_id: &str) -> Result<TrackingMode, ConfigError> {
        match self.lead_source.to_lowercase().as_str() {
            "disabled" => Ok(TrackingMode::Disabled),
            "utm" => Ok(TrackingMode::Utm),
            "form" => Ok(TrackingMode::Form),
            "custom" => Ok(TrackingMode::Custom(CustomSource {
                name: self.custom_source_name.clone().unwrap_or_default(),
                source: self.custom_source.clone(),
                medium: self.custom_medium.clone(),
                campaign: self.custom_campaign.clone(),
            })),
            other => Err(ConfigError::Invalid(format!(
                "form {}: unknown leadSource {}",
                form_id, other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadflow_domain::TemperatureTier;

    const FULL_CONFIG: &str = r#"
        [server]
        bind_address = "0.0.0.0"
        bind_port = 9000
        database_path = "/var/lib/leadflow/leads.db"

        [intake]
        persistence_attempts = 5
        notification_webhook = "https://hooks.example.com/leads"

        [intake.qualification_rules]
        mql_threshold = 60

        [intake.source_names]
        partner = "Partner Network"

        [distribution]
        max_cas_retries = 4

        [distribution.working_hours]
        start_hour = 8
        end_hour = 20
        days = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat"]

        [[temperature.thresholds]]
        max_elapsed_hours = 1
        tier = "hot"

        [[temperature.thresholds]]
        max_elapsed_hours = 12
        tier = "warm"

        [sweeper]
        sweep_interval_minutes = 5
        dry_run = true

        [[pipelines]]
        id = "sales"
        name = "Sales"
        stages = ["new", "contacted", "won"]

        [[pipelines.members]]
        id = "alice"

        [[pipelines.members]]
        id = "bob"
        active = false
        join_order = 7

        [pipelines.distribution_rule]
        mode = "round_robin"
        working_hours_only = true

        [[forms]]
        id = "contact"
        name = "Contact us"
        pipeline_id = "sales"
        required_fields = ["email"]

        [forms.lead_tracking]
        leadSource = "custom"
        customSourceName = "Trade Show"
        customCampaign = "expo-2024"

        [[forms.scoring_rules]]
        field_id = "budget"
        condition = "range"
        value = "1000,5000"
        points = 40
    "#;

    #[test]
    fn test_parse_full_config() {
        let config = ServerConfig::from_toml_str(FULL_CONFIG).unwrap();

        assert_eq!(config.bind_addr(), "0.0.0.0:9000");
        assert_eq!(config.intake.persistence_attempts, 5);
        assert_eq!(config.intake.qualification_rules.mql_threshold, 60);
        assert_eq!(config.intake.source_name_table().lookup("partner"), Some("Partner Network"));
        assert_eq!(config.distribution.max_cas_retries, 4);
        assert_eq!(config.distribution.working_hours.start_hour, 8);
        assert!(config.sweeper.dry_run);

        let thresholds = config.temperature.thresholds().unwrap();
        assert_eq!(thresholds.classify_at(0, 2 * 3600 * 1000), TemperatureTier::Warm);
        assert_eq!(thresholds.classify_at(0, 13 * 3600 * 1000), TemperatureTier::Frozen);
    }

    #[test]
    fn test_pipeline_conversion() {
        let config = ServerConfig::from_toml_str(FULL_CONFIG).unwrap();
        let pipeline = &config.pipelines[0];

        assert_eq!(pipeline.to_pipeline().unwrap().initial_stage(), "new");
        assert_eq!(
            pipeline.to_members().unwrap(),
            vec![PipelineMember::new("alice", true, 0), PipelineMember::new("bob", false, 7)]
        );

        let rule = pipeline.to_rule().unwrap().unwrap();
        assert_eq!(rule.mode, DistributionMode::RoundRobin);
        assert!(rule.working_hours_only);
        assert!(rule.skip_inactive_members);
        assert!(rule.fallback_to_manual);
    }

    #[test]
    fn test_form_conversion() {
        let config = ServerConfig::from_toml_str(FULL_CONFIG).unwrap();
        let form = config.forms[0].to_definition().unwrap();

        assert_eq!(form.required_fields, vec!["email".to_string()]);
        assert_eq!(form.scoring_rules[0].condition, Condition::Range);
        assert_eq!(form.scoring_rules[0].comparison_value, "1000,5000");
        match form.tracking {
            TrackingMode::Custom(custom) => {
                assert_eq!(custom.name, "Trade Show");
                assert_eq!(custom.campaign.as_deref(), Some("expo-2024"));
                assert_eq!(custom.source, None);
            }
            other => panic!("expected custom tracking, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = ServerConfig::from_toml_str("").unwrap();
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
        assert_eq!(config.server.database_path, "leadflow.db");
        assert!(config.pipelines.is_empty());
    }

    #[test]
    fn test_default_test_config_is_valid() {
        let config = ServerConfig::default_test_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.forms[0].to_definition().unwrap().tracking, TrackingMode::Utm);
    }

    #[test]
    fn test_rejects_unknown_pipeline_reference() {
        let mut config = ServerConfig::default_test_config();
        config.forms[0].pipeline_id = "support".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(msg)) if msg.contains("support")));
    }

    #[test]
    fn test_rejects_bad_catalog_values() {
        let mut config = ServerConfig::default_test_config();
        config.forms[0].scoring_rules[0].condition = "between".to_string();
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default_test_config();
        config.forms[0].lead_tracking.lead_source = "cookies".to_string();
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default_test_config();
        if let Some(rule) = config.pipelines[0].distribution_rule.as_mut() {
            rule.mode = "weighted".to_string();
        }
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default_test_config();
        config.pipelines[0].members[1].id = "alice".to_string();
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default_test_config();
        config.pipelines[0].stages.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_engine_settings() {
        let toml = r#"
            [sweeper]
            batch_limit = 0
        "#;
        assert!(matches!(ServerConfig::from_toml_str(toml), Err(ConfigError::Invalid(_))));

        let toml = r#"
            [[temperature.thresholds]]
            max_elapsed_hours = 5
            tier = "frozen"
        "#;
        assert!(ServerConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn test_sample_config_file() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../leadflow.toml");
        let config = ServerConfig::from_file(path).unwrap();

        assert_eq!(config.pipelines[0].stages.len(), 5);
        assert_eq!(config.forms[0].scoring_rules.len(), 3);
        assert!(!config.pipelines[0].members[2].active);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            ServerConfig::from_file("/nonexistent/leadflow.toml"),
            Err(ConfigError::FileRead(_))
        ));
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(
            ServerConfig::from_toml_str("[server\nbind_port = 1"),
            Err(ConfigError::TomlParse(_))
        ));
    }
}
