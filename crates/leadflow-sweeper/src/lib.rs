//! Leadflow Sweeper
//!
//! Periodic re-tagging of stored lead temperatures.
//!
//! Every read already recomputes a lead's tier from its
//! `initial_stage_entry_time`. The stored tag is what list filters and
//! reports see, so this crate walks all leads on a schedule and writes back
//! the tiers that changed.
//!
//! # Usage
//!
//! ## One-time Sweep
//!
//! ```no_run
//! use leadflow_domain::TemperatureThresholds;
//! use leadflow_store::SqliteStore;
//! use leadflow_sweeper::{SweeperConfig, TemperatureSweeper};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SqliteStore::new("leadflow.db")?;
//! let mut sweeper = TemperatureSweeper::new(SweeperConfig::default(), TemperatureThresholds::default());
//! let metrics = sweeper.sweep(&store, leadflow_domain::now_millis())?;
//! println!("{}", metrics.summary());
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! ```toml
//! [sweeper]
//! sweep_interval_minutes = 15
//! dry_run = false
//! batch_limit = 500
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod error;
mod metrics;
mod sweeper;
mod worker;

pub use config::SweeperConfig;
pub use error::SweeperError;
pub use metrics::SweepMetrics;
pub use sweeper::TemperatureSweeper;
pub use worker::SweepWorker;
