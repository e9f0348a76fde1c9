//! Trait definitions for external interactions
//!
//! These traits define the boundaries between domain logic and
//! infrastructure. Implementations live in other crates (`leadflow-store`
//! for SQLite, test doubles next to the tests that need them).
//!
//! All methods take `&self`: intake runs concurrently, so implementations
//! synchronize internally.

use crate::{
    DistributionRule, FormDefinition, Lead, LeadId, Pipeline, PipelineMember, StageTransition, SubmissionId,
    TemperatureTier,
};

/// Trait for persisting and reading leads
///
/// Implemented by the infrastructure layer (leadflow-store)
pub trait LeadStore {
    /// Error type for store operations
    type Error;

    /// Persist a new lead
    ///
    /// Writing the same lead twice is a no-op, so callers may retry.
    fn create(&self, lead: &Lead) -> Result<(), Self::Error>;

    /// Get a lead by id
    fn read(&self, id: LeadId) -> Result<Option<Lead>, Self::Error>;

    /// Get the lead built from a submission, if any
    fn find_by_submission(&self, submission_id: SubmissionId) -> Result<Option<Lead>, Self::Error>;

    /// Move a lead to a stage, returning the updated lead
    fn update_stage(&self, id: LeadId, transition: &StageTransition) -> Result<Option<Lead>, Self::Error>;

    /// List leads matching a query
    fn list(&self, query: &LeadQuery) -> Result<Vec<Lead>, Self::Error>;

    /// Store a recomputed temperature tag; returns false if the lead is unknown
    fn update_temperature(&self, id: LeadId, tier: TemperatureTier) -> Result<bool, Self::Error>;

    /// Store the geo lookup result; returns false if the lead is unknown
    fn update_location(&self, id: LeadId, location: &str) -> Result<bool, Self::Error>;

    /// Append an entry to the lead's stage history
    fn record_stage_entry(&self, id: LeadId, stage_id: &str, at: u64) -> Result<(), Self::Error>;

    /// Stage history of a lead, oldest first
    fn stage_history(&self, id: LeadId) -> Result<Vec<StageHistoryEntry>, Self::Error>;
}

/// Query criteria for listing leads
#[derive(Debug, Clone, Default)]
pub struct LeadQuery {
    /// Filter by pipeline
    pub pipeline_id: Option<String>,

    /// Filter by stored temperature tag
    pub tier: Option<TemperatureTier>,

    /// Skip this many leads (oldest first)
    pub offset: Option<usize>,

    /// Maximum results to return
    pub limit: Option<usize>,
}

/// One entry of a lead's stage history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageHistoryEntry {
    /// Stage entered
    pub stage_id: String,
    /// When it was entered (ms since epoch)
    pub entered_at: u64,
}

/// Trait for reading distribution rules and advancing their cursor
///
/// Implemented by the infrastructure layer (leadflow-store)
pub trait DistributionRuleStore {
    /// Error type for store operations
    type Error;

    /// Get the distribution rule of a pipeline
    fn distribution_rule(&self, pipeline_id: &str) -> Result<Option<DistributionRule>, Self::Error>;

    /// Set the rotation cursor to `new` if it still equals `expected`
    ///
    /// Returns false when another writer got there first.
    fn compare_and_swap_cursor(&self, pipeline_id: &str, expected: u64, new: u64) -> Result<bool, Self::Error>;
}

/// Trait for looking up pipelines and their members
pub trait PipelineRegistry {
    /// Error type for registry operations
    type Error;

    /// Get a pipeline by id
    fn pipeline(&self, pipeline_id: &str) -> Result<Option<Pipeline>, Self::Error>;

    /// Members of a pipeline, in any order
    fn members(&self, pipeline_id: &str) -> Result<Vec<PipelineMember>, Self::Error>;
}

/// Trait for looking up form definitions
pub trait FormRegistry {
    /// Error type for registry operations
    type Error;

    /// Get a form by id
    fn form(&self, form_id: &str) -> Result<Option<FormDefinition>, Self::Error>;
}
