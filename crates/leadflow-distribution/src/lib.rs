//! Leadflow Distribution
//!
//! Round-robin allocation of new leads to pipeline members.
//!
//! # Overview
//!
//! Each pipeline owns one [`DistributionRule`](leadflow_domain::DistributionRule)
//! holding a persisted `rotation_cursor`. The [`RoundRobinAllocator`] picks the
//! eligible member at the cursor and advances it, which hands out leads in a
//! strict cycle over the pipeline's members.
//!
//! # Concurrency
//!
//! The cursor is shared state. Two layers keep the rotation fair:
//!
//! - inside one process, allocations for the same pipeline run under a
//!   per-pipeline lock
//! - across processes sharing a database, the cursor is only advanced with a
//!   compare-and-swap; a lost race re-reads the rule and retries, up to
//!   [`DistributionConfig::max_cas_retries`] times
//!
//! Every successful call consumes exactly one slot, so calls are not
//! idempotent. Callers guard re-invocation themselves (intake does it with the
//! submission id).
//!
//! # Usage
//!
//! ```no_run
//! use leadflow_distribution::{DistributionConfig, RoundRobinAllocator};
//! use leadflow_store::SqliteStore;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(SqliteStore::new("leadflow.db")?);
//! let allocator = RoundRobinAllocator::new(store, DistributionConfig::default());
//!
//! let assignment = allocator.assign("sales", leadflow_domain::now_millis())?;
//! println!("{:?}", assignment.member_id());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod allocator;
mod config;
mod error;
mod working_hours;

pub use allocator::RoundRobinAllocator;
pub use config::DistributionConfig;
pub use error::AllocationError;
pub use working_hours::WorkingHours;
