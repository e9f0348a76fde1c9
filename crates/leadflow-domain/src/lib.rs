//! Leadflow Domain Layer
//!
//! Core business logic of the lead qualification and distribution engine.
//! This crate holds the data model, the pure computations that run during
//! intake and on read, and the trait interfaces the infrastructure crates
//! implement.
//!
//! ## Key Concepts
//!
//! - **Submission**: an immutable raw form submission
//! - **Lead**: the scored, attributed and assigned record built from it
//! - **Scoring rules**: deterministic per-field conditions awarding points
//! - **Attribution**: where the lead came from (UTM, custom, form, website)
//! - **Temperature**: freshness tier derived from dwell time in the first stage
//! - **Distribution**: circular assignment of leads to pipeline members
//!
//! ## Architecture
//!
//! - Only `uuid` as an external dependency
//! - Pure functions for scoring, attribution and classification
//! - Infrastructure implementations live in other crates
//! - Trait definitions for all external interactions

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod attribution;
pub mod distribution;
pub mod field_value;
pub mod ids;
pub mod lead;
pub mod pipeline;
pub mod scoring;
pub mod submission;
pub mod temperature;
pub mod traits;

// Re-exports for convenience
pub use attribution::{AttributionResolver, CustomSource, Origin, SourceNameTable, SourceType, TrackingMode};
pub use distribution::{Assignment, DistributionMode, DistributionRule, PipelineMember, UnassignedReason};
pub use field_value::FieldValue;
pub use ids::{LeadId, SubmissionId};
pub use lead::{Lead, StageTransition};
pub use pipeline::{FormDefinition, Pipeline};
pub use scoring::{Condition, RuleOutcome, ScoreOutcome, ScoringEngine, ScoringRule, DEFAULT_MQL_THRESHOLD};
pub use submission::{Submission, UtmParams};
pub use temperature::{TemperatureThresholds, TemperatureTier};

/// Current wall-clock time in milliseconds since the Unix epoch.
///
/// Returns 0 if the system clock is set before the epoch.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
