//! Distribution rules and round-robin selection primitives
//!
//! The stateful part of round-robin (the persisted cursor and its
//! serialization) lives in `leadflow-distribution`; this module holds the
//! data model and the pure pieces: rotation order, eligibility and slot
//! selection.

/// Allocation strategy of a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DistributionMode {
    /// Leads stay unassigned until someone picks them up
    Manual,
    /// Leads rotate through the pipeline's members
    RoundRobin,
}

impl DistributionMode {
    /// Get the mode name as used in configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            DistributionMode::Manual => "manual",
            DistributionMode::RoundRobin => "round_robin",
        }
    }

    /// Parse a mode name
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "manual" => Some(DistributionMode::Manual),
            "round_robin" => Some(DistributionMode::RoundRobin),
            _ => None,
        }
    }
}

/// Distribution rule of a single pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionRule {
    /// Pipeline this rule belongs to
    pub pipeline_id: String,
    /// Allocation strategy
    pub mode: DistributionMode,
    /// Whether distribution runs at all
    pub is_active: bool,
    /// Exclude inactive members from the rotation
    pub skip_inactive_members: bool,
    /// Leave the lead unassigned instead of failing when nobody is eligible
    pub fallback_to_manual: bool,
    /// Only rotate during business hours
    pub working_hours_only: bool,
    /// Index of the next slot in the eligible list
    pub rotation_cursor: u64,
}

impl DistributionRule {
    /// Create an active round-robin rule with the cursor at zero
    pub fn round_robin(pipeline_id: impl Into<String>) -> Self {
        Self {
            pipeline_id: pipeline_id.into(),
            mode: DistributionMode::RoundRobin,
            is_active: true,
            skip_inactive_members: true,
            fallback_to_manual: true,
            working_hours_only: false,
            rotation_cursor: 0,
        }
    }

    /// Create an active manual rule
    pub fn manual(pipeline_id: impl Into<String>) -> Self {
        Self {
            mode: DistributionMode::Manual,
            ..Self::round_robin(pipeline_id)
        }
    }
}

/// A member of a pipeline who can receive leads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineMember {
    /// Member id
    pub id: String,
    /// Whether the member currently takes leads
    pub is_active: bool,
    /// Position in the rotation sequence
    pub join_order: u32,
}

impl PipelineMember {
    /// Create a member
    pub fn new(id: impl Into<String>, is_active: bool, join_order: u32) -> Self {
        Self {
            id: id.into(),
            is_active,
            join_order,
        }
    }
}

/// Sort members into rotation order: `join_order` ascending, then id
pub fn rotation_order(members: &mut [PipelineMember]) {
    members.sort_by(|a, b| a.join_order.cmp(&b.join_order).then_with(|| a.id.cmp(&b.id)));
}

/// Members eligible for the next assignment, in rotation order
pub fn eligible_members(rule: &DistributionRule, members: &[PipelineMember]) -> Vec<PipelineMember> {
    let mut eligible: Vec<PipelineMember> = members
        .iter()
        .filter(|m| !rule.skip_inactive_members || m.is_active)
        .cloned()
        .collect();
    rotation_order(&mut eligible);
    eligible
}

/// Pick the slot for a cursor value
///
/// Returns the selected index and the cursor value that follows it, or
/// `None` when there is nobody to pick.
pub fn select_slot(cursor: u64, eligible_len: usize) -> Option<(usize, u64)> {
    if eligible_len == 0 {
        return None;
    }
    let len = eligible_len as u64;
    let index = cursor % len;
    Some((index as usize, (index + 1) % len))
}

/// Why a lead was left unassigned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnassignedReason {
    /// No rule, or the rule is switched off
    RuleInactive,
    /// The pipeline distributes manually
    ManualMode,
    /// Nobody eligible and the rule falls back to manual
    NoEligibleMembers,
    /// Working-hours-only rule outside business hours
    OutsideWorkingHours,
}

impl UnassignedReason {
    /// Get the reason as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            UnassignedReason::RuleInactive => "rule_inactive",
            UnassignedReason::ManualMode => "manual_mode",
            UnassignedReason::NoEligibleMembers => "no_eligible_members",
            UnassignedReason::OutsideWorkingHours => "outside_working_hours",
        }
    }
}

/// Result of an allocation attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignment {
    /// A member received the lead
    Assigned {
        /// Receiving member
        member_id: String,
        /// Index in the eligible list that was consumed
        slot: usize,
    },
    /// The lead stays unassigned
    Unassigned(UnassignedReason),
}

impl Assignment {
    /// The assigned member, if any
    pub fn member_id(&self) -> Option<&str> {
        match self {
            Assignment::Assigned { member_id, .. } => Some(member_id),
            Assignment::Unassigned(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_order_ties_broken_by_id() {
        let mut members = vec![
            PipelineMember::new("carol", true, 2),
            PipelineMember::new("bob", true, 1),
            PipelineMember::new("alice", true, 1),
        ];
        rotation_order(&mut members);
        let ids: Vec<_> = members.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["alice", "bob", "carol"]);
    }

    #[test]
    fn test_eligible_members_skip_inactive() {
        let members = vec![
            PipelineMember::new("a", true, 0),
            PipelineMember::new("b", false, 1),
            PipelineMember::new("c", true, 2),
        ];

        let mut rule = DistributionRule::round_robin("p1");
        let ids: Vec<_> = eligible_members(&rule, &members).into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["a", "c"]);

        rule.skip_inactive_members = false;
        assert_eq!(eligible_members(&rule, &members).len(), 3);
    }

    #[test]
    fn test_select_slot_wraps() {
        assert_eq!(select_slot(0, 3), Some((0, 1)));
        assert_eq!(select_slot(2, 3), Some((2, 0)));
        assert_eq!(select_slot(7, 3), Some((1, 2)));
        assert_eq!(select_slot(5, 0), None);
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!(DistributionMode::parse("round_robin"), Some(DistributionMode::RoundRobin));
        assert_eq!(DistributionMode::parse("Manual"), Some(DistributionMode::Manual));
        assert_eq!(DistributionMode::parse("random"), None);
    }
}
