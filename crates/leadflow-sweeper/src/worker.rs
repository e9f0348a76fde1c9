//! Background worker running the sweep on a schedule

use crate::{SweepMetrics, SweeperConfig, SweeperError, TemperatureSweeper};
use leadflow_domain::traits::LeadStore;
use leadflow_domain::{now_millis, TemperatureThresholds};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Background worker that runs the temperature sweep at a fixed interval
///
/// # Examples
///
/// ```no_run
/// use leadflow_domain::TemperatureThresholds;
/// use leadflow_store::SqliteStore;
/// use leadflow_sweeper::{SweepWorker, SweeperConfig};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = Arc::new(SqliteStore::new("leadflow.db")?);
///     let mut worker = SweepWorker::new(SweeperConfig::default(), TemperatureThresholds::default());
///
///     // Run until Ctrl+C
///     worker.run(store).await?;
///     Ok(())
/// }
/// ```
pub struct SweepWorker {
    sweeper: TemperatureSweeper,
    interval: Duration,
}

impl SweepWorker {
    /// Create a new background worker
    pub fn new(config: SweeperConfig, thresholds: TemperatureThresholds) -> Self {
        // A zero period would make tokio's interval panic
        let interval = config.sweep_interval().max(Duration::from_secs(1));
        Self {
            sweeper: TemperatureSweeper::new(config, thresholds),
            interval,
        }
    }

    /// Time between sweeps
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run until a shutdown signal (Ctrl+C) is received
    pub async fn run<S>(&mut self, store: Arc<S>) -> Result<(), SweeperError>
    where
        S: LeadStore,
        S::Error: Display,
    {
        self.run_until(store, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run until `shutdown` completes
    ///
    /// A failed sweep is logged and the worker keeps going.
    pub async fn run_until<S, F>(&mut self, store: Arc<S>, shutdown: F) -> Result<(), SweeperError>
    where
        S: LeadStore,
        S::Error: Display,
        F: Future<Output = ()>,
    {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        tracing::info!(interval = ?self.interval, "Sweep worker started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    tracing::debug!("Starting sweep cycle");
                    if let Err(e) = self.sweeper.sweep(store.as_ref(), now_millis()) {
                        tracing::error!(error = %e, "Sweep failed");
                    }
                }
                _ = &mut shutdown => {
                    tracing::info!("Shutdown signal received, stopping sweep worker");
                    break;
                }
            }
        }

        tracing::info!("Sweep worker stopped. Final metrics:\n{}", self.sweeper.metrics().summary());
        Ok(())
    }

    /// Run for a specific number of cycles
    ///
    /// Unlike [`run`](Self::run), the first failed sweep is returned.
    pub async fn run_cycles<S>(&mut self, store: Arc<S>, cycles: usize) -> Result<(), SweeperError>
    where
        S: LeadStore,
        S::Error: Display,
    {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        for cycle in 0..cycles {
            ticker.tick().await;
            tracing::debug!("Starting sweep cycle {}/{}", cycle + 1, cycles);

            if let Err(e) = self.sweeper.sweep(store.as_ref(), now_millis()) {
                tracing::error!("Sweep {}/{} failed: {}", cycle + 1, cycles, e);
                return Err(e);
            }
        }

        tracing::info!("Sweep worker finished {} cycles. Final metrics:\n{}", cycles, self.sweeper.metrics().summary());
        Ok(())
    }

    /// Get a reference to the sweeper's current metrics
    pub fn metrics(&self) -> &SweepMetrics {
        self.sweeper.metrics()
    }

    /// Reset the sweeper's metrics counters
    pub fn reset_metrics(&mut self) {
        self.sweeper.reset_metrics();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_creation() {
        let worker = SweepWorker::new(SweeperConfig::default(), TemperatureThresholds::default());
        assert_eq!(worker.metrics().sweep_count, 0);
        assert_eq!(worker.interval(), Duration::from_secs(15 * 60));
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let config = SweeperConfig {
            sweep_interval_minutes: 0,
            ..Default::default()
        };
        let worker = SweepWorker::new(config, TemperatureThresholds::default());
        assert_eq!(worker.interval(), Duration::from_secs(1));
    }
}
