//! Pipelines and form definitions

use crate::{ScoringRule, TrackingMode};

/// A sales pipeline with ordered stages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    /// Pipeline id
    pub id: String,
    /// Display name
    pub name: String,
    /// Stage ids in board order; the first is the initial stage
    pub stages: Vec<String>,
}

impl Pipeline {
    /// Create a pipeline
    ///
    /// # Errors
    /// Returns error if the pipeline has no stages or repeats a stage id
    pub fn new(id: impl Into<String>, name: impl Into<String>, stages: Vec<String>) -> Result<Self, String> {
        let id = id.into();
        if stages.is_empty() {
            return Err(format!("Pipeline '{}' needs at least one stage", id));
        }
        for (i, stage) in stages.iter().enumerate() {
            if stage.trim().is_empty() {
                return Err(format!("Pipeline '{}' has an empty stage id", id));
            }
            if stages[..i].contains(stage) {
                return Err(format!("Pipeline '{}' repeats stage '{}'", id, stage));
            }
        }
        Ok(Self {
            id,
            name: name.into(),
            stages,
        })
    }

    /// The designated first stage
    pub fn initial_stage(&self) -> &str {
        // Non-empty by construction
        &self.stages[0]
    }

    /// Whether the pipeline has a stage
    pub fn has_stage(&self, stage_id: &str) -> bool {
        self.stages.iter().any(|s| s == stage_id)
    }

    /// Whether `stage_id` is the initial stage
    pub fn is_initial_stage(&self, stage_id: &str) -> bool {
        self.initial_stage() == stage_id
    }
}

/// Everything intake needs to know about a form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormDefinition {
    /// Form id
    pub id: String,
    /// Display name (used by form-based attribution)
    pub name: String,
    /// Pipeline new leads land in
    pub pipeline_id: String,
    /// Attribution mode
    pub tracking: TrackingMode,
    /// Ordered scoring rules
    pub scoring_rules: Vec<ScoringRule>,
    /// Per-form MQL cutoff; the global default applies when `None`
    pub mql_threshold: Option<u32>,
    /// Fields that must be present and non-empty
    pub required_fields: Vec<String>,
}
