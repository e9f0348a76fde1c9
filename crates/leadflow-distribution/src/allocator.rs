//! Round-robin allocator

use crate::{AllocationError, DistributionConfig};
use leadflow_domain::distribution::{eligible_members, select_slot};
use leadflow_domain::traits::{DistributionRuleStore, PipelineRegistry};
use leadflow_domain::{Assignment, DistributionMode, UnassignedReason};
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::{Arc, Mutex, PoisonError};

/// Hands out leads to pipeline members in rotation
///
/// The allocator is cheap to share: wrap it in an `Arc` and call
/// [`assign`](Self::assign) from any thread.
pub struct RoundRobinAllocator<S> {
    store: Arc<S>,
    config: DistributionConfig,
    pipeline_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<S> RoundRobinAllocator<S>
where
    S: DistributionRuleStore + PipelineRegistry,
    <S as DistributionRuleStore>::Error: Display,
    <S as PipelineRegistry>::Error: Display,
{
    /// Create an allocator over the given store
    pub fn new(store: Arc<S>, config: DistributionConfig) -> Self {
        Self {
            store,
            config,
            pipeline_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Get the allocator configuration
    pub fn config(&self) -> &DistributionConfig {
        &self.config
    }

    /// Allocate the next member of a pipeline
    ///
    /// `at` is the allocation time in ms since epoch, checked against the
    /// working-hours window of `working_hours_only` rules.
    ///
    /// Returns [`Assignment::Unassigned`] when the rule is missing or
    /// inactive, in manual mode, outside working hours, or when nobody is
    /// eligible and the rule falls back to manual. None of these consume a
    /// rotation slot.
    ///
    /// # Errors
    ///
    /// - [`AllocationError::Exhausted`] when nobody is eligible and the rule
    ///   does not fall back to manual
    /// - [`AllocationError::Contention`] when every compare-and-swap attempt
    ///   lost to another writer
    /// - [`AllocationError::Store`] when the store fails
    pub fn assign(&self, pipeline_id: &str, at: u64) -> Result<Assignment, AllocationError> {
        let lock = self.pipeline_lock(pipeline_id);
        // The guarded value is (), so a poisoned lock is still usable
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let max_attempts = self.config.max_attempts();
        for attempt in 1..=max_attempts {
            let rule = self
                .store
                .distribution_rule(pipeline_id)
                .map_err(|e| AllocationError::Store(e.to_string()))?;

            let Some(rule) = rule.filter(|r| r.is_active) else {
                return Ok(Assignment::Unassigned(UnassignedReason::RuleInactive));
            };

            if rule.mode != DistributionMode::RoundRobin {
                return Ok(Assignment::Unassigned(UnassignedReason::ManualMode));
            }

            if rule.working_hours_only && !self.config.working_hours.contains(at) {
                tracing::debug!(pipeline_id, at, "Outside working hours, leaving lead unassigned");
                return Ok(Assignment::Unassigned(UnassignedReason::OutsideWorkingHours));
            }

            let members = self
                .store
                .members(pipeline_id)
                .map_err(|e| AllocationError::Store(e.to_string()))?;
            let eligible = eligible_members(&rule, &members);

            let Some((slot, next_cursor)) = select_slot(rule.rotation_cursor, eligible.len()) else {
                if rule.fallback_to_manual {
                    tracing::info!(pipeline_id, "No eligible members, falling back to manual");
                    return Ok(Assignment::Unassigned(UnassignedReason::NoEligibleMembers));
                }
                tracing::warn!(pipeline_id, "No eligible members and no manual fallback");
                return Err(AllocationError::Exhausted {
                    pipeline_id: pipeline_id.to_string(),
                });
            };

            let swapped = self
                .store
                .compare_and_swap_cursor(pipeline_id, rule.rotation_cursor, next_cursor)
                .map_err(|e| AllocationError::Store(e.to_string()))?;

            if swapped {
                let member_id = eligible[slot].id.clone();
                tracing::debug!(
                    pipeline_id,
                    member_id = %member_id,
                    slot,
                    next_cursor,
                    "Assigned lead"
                );
                return Ok(Assignment::Assigned { member_id, slot });
            }

            tracing::debug!(pipeline_id, attempt, "Rotation cursor moved underneath us, retrying");
        }

        tracing::warn!(pipeline_id, attempts = max_attempts, "Gave up on contended rotation cursor");
        Err(AllocationError::Contention {
            pipeline_id: pipeline_id.to_string(),
            attempts: max_attempts,
        })
    }

    fn pipeline_lock(&self, pipeline_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.pipeline_locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks
            .entry(pipeline_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
