//! Lead module - the finalized record produced by intake

use crate::{LeadId, Origin, SubmissionId, TemperatureThresholds, TemperatureTier};

/// Location recorded until the geo lookup reports back
pub const UNKNOWN_LOCATION: &str = "unknown";

/// A qualified, attributed and possibly assigned lead
///
/// Created once by intake. Afterwards only the stage fields, the temperature
/// tag, the location and the assignment change.
#[derive(Debug, Clone, PartialEq)]
pub struct Lead {
    /// Unique identifier
    pub id: LeadId,

    /// Submission this lead was built from (idempotency key)
    pub submission_id: SubmissionId,

    /// Form the submission was posted to
    pub form_id: String,

    /// Clamped score in [0, 100]
    pub score: u8,

    /// Marketing qualified
    pub is_mql: bool,

    /// Last computed freshness tier
    pub temperature_tier: TemperatureTier,

    /// Attribution descriptor
    pub origin: Origin,

    /// Member the lead was assigned to
    pub assigned_member_id: Option<String>,

    /// Pipeline the lead lives in
    pub pipeline_id: String,

    /// Current stage
    pub stage_id: String,

    /// Best-effort geo location of the client IP
    pub location: String,

    /// When the lead was created (ms since epoch)
    pub created_at: u64,

    /// When the lead last entered the pipeline's initial stage
    pub initial_stage_entry_time: u64,

    /// When the lead entered its current stage
    pub current_stage_entry_time: u64,
}

/// A move of a lead into a stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageTransition {
    /// Target stage
    pub stage_id: String,
    /// Whether the target is the pipeline's initial stage
    pub is_initial_stage: bool,
    /// When the move happened (ms since epoch)
    pub at: u64,
}

impl Lead {
    /// Create an unassigned lead sitting in the pipeline's initial stage
    #[allow(clippy::too_many_arguments)]
    pub fn new_unassigned(
        submission_id: SubmissionId,
        form_id: String,
        score: u8,
        is_mql: bool,
        origin: Origin,
        pipeline_id: String,
        initial_stage_id: String,
        entered_at: u64,
    ) -> Self {
        Self {
            id: LeadId::new(),
            submission_id,
            form_id,
            score,
            is_mql,
            temperature_tier: TemperatureTier::Hot,
            origin,
            assigned_member_id: None,
            pipeline_id,
            stage_id: initial_stage_id,
            location: UNKNOWN_LOCATION.to_string(),
            created_at: entered_at,
            initial_stage_entry_time: entered_at,
            current_stage_entry_time: entered_at,
        }
    }

    /// Apply a stage move
    ///
    /// `current_stage_entry_time` always moves; `initial_stage_entry_time`
    /// only resets when the lead re-enters the initial stage.
    pub fn apply_transition(&mut self, transition: &StageTransition) {
        self.stage_id = transition.stage_id.clone();
        self.current_stage_entry_time = transition.at;
        if transition.is_initial_stage {
            self.initial_stage_entry_time = transition.at;
        }
    }

    /// Recompute the temperature tier at `now`, returning the new tier
    pub fn refresh_temperature(&mut self, thresholds: &TemperatureThresholds, now: u64) -> TemperatureTier {
        self.temperature_tier = thresholds.classify_at(self.initial_stage_entry_time, now);
        self.temperature_tier
    }
}
