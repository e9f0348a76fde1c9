//! Temperature classification
//!
//! A lead's temperature is a coarse freshness tier derived from how long it
//! has been sitting in its pipeline's initial stage. The tier is never stored
//! as truth: it is recomputed from `initial_stage_entry_time` on read, and a
//! periodic sweep re-tags leads in bulk.

use std::time::Duration;

/// Freshness tier of a lead
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TemperatureTier {
    /// Just arrived
    Hot,
    /// Still recent
    Warm,
    /// Getting old
    Cold,
    /// Past every configured threshold
    Frozen,
}

impl TemperatureTier {
    /// Get the tier name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            TemperatureTier::Hot => "hot",
            TemperatureTier::Warm => "warm",
            TemperatureTier::Cold => "cold",
            TemperatureTier::Frozen => "frozen",
        }
    }

    /// Parse a tier from a string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "hot" => Some(TemperatureTier::Hot),
            "warm" => Some(TemperatureTier::Warm),
            "cold" => Some(TemperatureTier::Cold),
            "frozen" => Some(TemperatureTier::Frozen),
            _ => None,
        }
    }
}

impl std::str::FromStr for TemperatureTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Invalid temperature tier: {}", s))
    }
}

/// Ordered `(max_elapsed, tier)` table
///
/// Entries are strictly ascending by `max_elapsed` and their tiers are
/// non-decreasing, which makes classification monotonic in elapsed time.
/// Anything past the last entry is [`TemperatureTier::Frozen`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemperatureThresholds {
    entries: Vec<(Duration, TemperatureTier)>,
}

impl Default for TemperatureThresholds {
    /// hot < 2h, warm < 24h, cold < 72h, else frozen
    fn default() -> Self {
        Self {
            entries: vec![
                (Duration::from_secs(2 * 3600), TemperatureTier::Hot),
                (Duration::from_secs(24 * 3600), TemperatureTier::Warm),
                (Duration::from_secs(72 * 3600), TemperatureTier::Cold),
            ],
        }
    }
}

impl TemperatureThresholds {
    /// Build a validated threshold table
    ///
    /// # Errors
    /// Returns error if the table is empty, not strictly ascending, has
    /// decreasing tiers, or bounds the terminal `frozen` tier.
    pub fn new(entries: Vec<(Duration, TemperatureTier)>) -> Result<Self, String> {
        if entries.is_empty() {
            return Err("Temperature thresholds cannot be empty".to_string());
        }

        for window in entries.windows(2) {
            let (prev_max, prev_tier) = window[0];
            let (max, tier) = window[1];
            if max <= prev_max {
                return Err(format!(
                    "Temperature thresholds must be strictly ascending ({:?} after {:?})",
                    max, prev_max
                ));
            }
            if tier < prev_tier {
                return Err(format!(
                    "Temperature tier {} cannot follow {}",
                    tier.as_str(),
                    prev_tier.as_str()
                ));
            }
        }

        if entries.iter().any(|(_, tier)| *tier == TemperatureTier::Frozen) {
            return Err("frozen is the terminal tier and cannot have an upper bound".to_string());
        }

        Ok(Self { entries })
    }

    /// Get the threshold entries
    pub fn entries(&self) -> &[(Duration, TemperatureTier)] {
        &self.entries
    }

    /// Classify an elapsed dwell time
    pub fn classify(&self, elapsed: Duration) -> TemperatureTier {
        self.entries
            .iter()
            .find(|(max_elapsed, _)| *max_elapsed > elapsed)
            .map(|(_, tier)| *tier)
            .unwrap_or(TemperatureTier::Frozen)
    }

    /// Classify a lead that entered its initial stage at `initial_stage_entry_time`
    ///
    /// Both arguments are milliseconds since the Unix epoch. An entry time in
    /// the future (clock skew) counts as zero elapsed.
    pub fn classify_at(&self, initial_stage_entry_time: u64, now: u64) -> TemperatureTier {
        let elapsed_ms = now.saturating_sub(initial_stage_entry_time);
        self.classify(Duration::from_millis(elapsed_ms))
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: tier never gets fresher as time passes
        #[test]
        fn test_tier_monotonic(a in 0u64..500_000_000, b in 0u64..500_000_000) {
            let t = TemperatureThresholds::default();
            let (earlier, later) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(t.classify(Duration::from_millis(earlier)) <= t.classify(Duration::from_millis(later)));
        }

        /// Property: classify_at matches classify on the difference
        #[test]
        fn test_classify_at_consistent(entry in 0u64..1_000_000_000, delta in 0u64..500_000_000) {
            let t = TemperatureThresholds::default();
            prop_assert_eq!(
                t.classify_at(entry, entry + delta),
                t.classify(Duration::from_millis(delta))
            );
        }
    }
}
