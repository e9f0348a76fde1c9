//! Leadflow Intake
//!
//! Turns raw form submissions into persisted leads.
//!
//! # Pipeline
//!
//! 1. **Validate** the submission against its form ([`SubmissionValidator`])
//! 2. **Replay** when the submission id already produced a lead; requests
//!    sharing a submission id are processed one at a time
//! 3. **Attribute** and **score** it (pure, see `leadflow-domain`)
//! 4. **Allocate** it with the pipeline's round-robin rule
//! 5. **Persist** it with bounded, idempotent write attempts
//! 6. **Fan out** best-effort side effects: stage history, notification,
//!    analytics and geo lookup, each on its own task under a timeout
//!
//! Side-effect failures are logged and never reach the caller.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod collaborators;
mod config;
mod coordinator;
mod error;
mod in_flight;
mod outcome;
mod validator;

pub use collaborators::{
    AnalyticsSink, GeoLookup, HttpGeoLookup, InMemoryAnalytics, NoopGeoLookup, NoopNotifier,
    NotificationDispatcher, WebhookNotifier,
};
pub use config::{IntakeConfig, MAX_PERSISTENCE_ATTEMPTS, QualificationRules, TemperatureConfig, ThresholdEntry};
pub use coordinator::IntakeCoordinator;
pub use error::{CollaboratorError, IntakeError};
pub use outcome::{AllocationStatus, IntakeOutcome, LeadNotice};
pub use validator::{RejectionReason, SubmissionValidator};
