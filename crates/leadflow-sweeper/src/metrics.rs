//! Metrics collected by the sweeper

use leadflow_domain::TemperatureTier;
use std::collections::HashMap;

/// Counters accumulated across sweeps
#[derive(Debug, Clone, Default)]
pub struct SweepMetrics {
    /// Leads re-tagged, keyed by their new tier
    pub retagged: HashMap<TemperatureTier, usize>,

    /// Leads examined
    pub scanned: usize,

    /// Tag writes that failed
    pub failed_writes: usize,

    /// Completed sweeps
    pub sweep_count: usize,

    /// Total runtime in milliseconds
    pub total_runtime_ms: u64,
}

impl SweepMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record examined leads
    pub fn record_scan(&mut self, count: usize) {
        self.scanned += count;
    }

    /// Record a lead moved to `tier`
    pub fn record_retag(&mut self, tier: TemperatureTier) {
        *self.retagged.entry(tier).or_insert(0) += 1;
    }

    /// Record a failed tag write
    pub fn record_failed_write(&mut self) {
        self.failed_writes += 1;
    }

    /// Record a completed sweep
    pub fn record_sweep(&mut self) {
        self.sweep_count += 1;
    }

    /// Leads re-tagged across all tiers
    pub fn total_retagged(&self) -> usize {
        self.retagged.values().sum()
    }

    /// Reset all metrics
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Generate a summary report of metrics
    pub fn summary(&self) -> String {
        let mut lines = vec![
            "Sweep Metrics Summary".to_string(),
            "=====================".to_string(),
            format!("Sweep cycles: {}", self.sweep_count),
            format!("Total runtime: {}ms", self.total_runtime_ms),
            format!("Leads scanned: {}", self.scanned),
            format!("Failed writes: {}", self.failed_writes),
        ];

        if !self.retagged.is_empty() {
            lines.push(String::new());
            lines.push("Re-tagged by tier:".to_string());
            let mut tiers: Vec<_> = self.retagged.iter().collect();
            tiers.sort();
            for (tier, count) in tiers {
                lines.push(format!("  {}: {}", tier.as_str(), count));
            }
            lines.push(format!("  Total: {}", self.total_retagged()));
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_retag() {
        let mut metrics = SweepMetrics::new();
        metrics.record_retag(TemperatureTier::Warm);
        metrics.record_retag(TemperatureTier::Cold);
        metrics.record_retag(TemperatureTier::Warm);

        assert_eq!(metrics.retagged[&TemperatureTier::Warm], 2);
        assert_eq!(metrics.total_retagged(), 3);
    }

    #[test]
    fn test_reset() {
        let mut metrics = SweepMetrics::new();
        metrics.record_scan(10);
        metrics.record_retag(TemperatureTier::Frozen);
        metrics.record_failed_write();
        metrics.record_sweep();

        metrics.reset();

        assert_eq!(metrics.scanned, 0);
        assert_eq!(metrics.total_retagged(), 0);
        assert_eq!(metrics.failed_writes, 0);
        assert_eq!(metrics.sweep_count, 0);
    }

    #[test]
    fn test_summary() {
        let mut metrics = SweepMetrics::new();
        metrics.record_scan(4);
        metrics.record_retag(TemperatureTier::Cold);
        metrics.record_retag(TemperatureTier::Frozen);
        metrics.record_sweep();
        metrics.total_runtime_ms = 12;

        let summary = metrics.summary();
        assert!(summary.contains("Sweep cycles: 1"));
        assert!(summary.contains("Total runtime: 12ms"));
        assert!(summary.contains("Leads scanned: 4"));
        assert!(summary.contains("cold: 1"));
        assert!(summary.contains("frozen: 1"));
        assert!(summary.contains("Total: 2"));
    }
}
