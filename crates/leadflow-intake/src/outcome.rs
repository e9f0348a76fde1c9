//! Results of intake

use leadflow_domain::{Lead, RuleOutcome, UnassignedReason};
use serde::{Deserialize, Serialize};

/// What happened to the lead's assignment during intake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocationStatus {
    /// A member received the lead
    Assigned {
        /// Receiving member
        member_id: String,
        /// Rotation slot consumed
        slot: usize,
    },

    /// The lead was left unassigned on purpose
    Unassigned(UnassignedReason),

    /// Nobody was eligible and the rule has no manual fallback; the lead
    /// needs manual intervention
    Exhausted,

    /// The submission was seen before; no allocation ran
    Replayed,
}

impl AllocationStatus {
    /// Status label as reported to clients and collaborators
    pub fn as_str(&self) -> &'static str {
        match self {
            AllocationStatus::Assigned { .. } => "assigned",
            AllocationStatus::Unassigned(reason) => reason.as_str(),
            AllocationStatus::Exhausted => "exhausted",
            AllocationStatus::Replayed => "replayed",
        }
    }

    /// Whether someone has to assign the lead by hand
    pub fn requires_manual_intervention(&self) -> bool {
        matches!(self, AllocationStatus::Exhausted)
    }
}

/// Result of a successful [`submit`](crate::IntakeCoordinator::submit)
#[derive(Debug, Clone, PartialEq)]
pub struct IntakeOutcome {
    /// The persisted lead
    pub lead: Lead,

    /// Allocation result
    pub allocation: AllocationStatus,

    /// True when the submission had already produced this lead
    pub replayed: bool,

    /// Per-rule scoring detail (empty on replay)
    pub score_breakdown: Vec<RuleOutcome>,
}

/// Summary of a new lead handed to collaborators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadNotice {
    /// Lead id
    pub lead_id: String,
    /// Form the lead came through
    pub form_id: String,
    /// Pipeline holding the lead
    pub pipeline_id: String,
    /// Stage the lead sits in
    pub stage_id: String,
    /// Origin display name
    pub origin: String,
    /// Clamped score
    pub score: u8,
    /// Marketing qualified
    pub is_mql: bool,
    /// Assigned member, if any
    pub assigned_member_id: Option<String>,
    /// Allocation status label
    pub allocation: String,
    /// Creation time (ms since epoch)
    pub created_at: u64,
}

impl LeadNotice {
    /// Summarize a lead
    pub fn new(lead: &Lead, allocation: &AllocationStatus) -> Self {
        Self {
            lead_id: lead.id.to_string(),
            form_id: lead.form_id.clone(),
            pipeline_id: lead.pipeline_id.clone(),
            stage_id: lead.stage_id.clone(),
            origin: lead.origin.name.clone(),
            score: lead.score,
            is_mql: lead.is_mql,
            assigned_member_id: lead.assigned_member_id.clone(),
            allocation: allocation.as_str().to_string(),
            created_at: lead.created_at,
        }
    }
}
