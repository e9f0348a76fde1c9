//! Bulk temperature re-tagging

use crate::{SweepMetrics, SweeperConfig, SweeperError};
use leadflow_domain::traits::{LeadQuery, LeadStore};
use leadflow_domain::TemperatureThresholds;
use std::fmt::Display;
use std::time::Instant;

/// Recomputes every lead's temperature and stores the tags that changed
///
/// Reads already recompute the tier, so the sweep only keeps the stored tag
/// (used for filtering and reporting) from drifting.
///
/// # Examples
///
/// ```no_run
/// use leadflow_domain::TemperatureThresholds;
/// use leadflow_store::SqliteStore;
/// use leadflow_sweeper::{SweeperConfig, TemperatureSweeper};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = SqliteStore::new("leadflow.db")?;
/// let mut sweeper = TemperatureSweeper::new(SweeperConfig::default(), TemperatureThresholds::default());
///
/// let metrics = sweeper.sweep(&store, leadflow_domain::now_millis())?;
/// println!("{}", metrics.summary());
/// # Ok(())
/// # }
/// ```
pub struct TemperatureSweeper {
    config: SweeperConfig,
    thresholds: TemperatureThresholds,
    metrics: SweepMetrics,
}

impl TemperatureSweeper {
    /// Create a sweeper
    pub fn new(config: SweeperConfig, thresholds: TemperatureThresholds) -> Self {
        Self {
            config,
            thresholds,
            metrics: SweepMetrics::new(),
        }
    }

    /// Get the sweeper configuration
    pub fn config(&self) -> &SweeperConfig {
        &self.config
    }

    /// Get a reference to the current metrics
    pub fn metrics(&self) -> &SweepMetrics {
        &self.metrics
    }

    /// Reset metrics counters
    pub fn reset_metrics(&mut self) {
        self.metrics.reset();
    }

    /// Run one sweep at `now` (ms since epoch)
    ///
    /// Leads are read in pages of `batch_limit`. A failed tag write is
    /// logged and counted; a failed page read aborts the sweep.
    ///
    /// Returns the updated metrics after the sweep.
    pub fn sweep<S>(&mut self, store: &S, now: u64) -> Result<SweepMetrics, SweeperError>
    where
        S: LeadStore,
        S::Error: Display,
    {
        let start = Instant::now();
        let limit = self.config.batch_limit.max(1);
        let mut offset = 0;
        let mut scanned = 0;
        let mut changed = 0;

        loop {
            let query = LeadQuery {
                offset: Some(offset),
                limit: Some(limit),
                ..Default::default()
            };
            let page = store.list(&query).map_err(|e| SweeperError::Store(e.to_string()))?;
            self.metrics.record_scan(page.len());
            scanned += page.len();

            for lead in &page {
                let tier = self.thresholds.classify_at(lead.initial_stage_entry_time, now);
                if tier == lead.temperature_tier {
                    continue;
                }

                if self.config.dry_run {
                    tracing::debug!(
                        lead_id = %lead.id,
                        from = lead.temperature_tier.as_str(),
                        to = tier.as_str(),
                        "Would re-tag lead"
                    );
                    changed += 1;
                    self.metrics.record_retag(tier);
                    continue;
                }

                match store.update_temperature(lead.id, tier) {
                    Ok(true) => {
                        changed += 1;
                        self.metrics.record_retag(tier);
                    }
                    // Deleted between the read and the write
                    Ok(false) => {}
                    Err(e) => {
                        tracing::warn!(lead_id = %lead.id, error = %e, "Failed to re-tag lead");
                        self.metrics.record_failed_write();
                    }
                }
            }

            if page.len() < limit {
                break;
            }
            offset += page.len();
        }

        self.metrics.record_sweep();
        self.metrics.total_runtime_ms += start.elapsed().as_millis() as u64;

        tracing::info!(
            scanned,
            changed,
            dry_run = self.config.dry_run,
            "Temperature sweep finished"
        );

        Ok(self.metrics.clone())
    }
}
