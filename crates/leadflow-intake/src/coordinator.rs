//! Intake coordinator: submission in, persisted lead out

use crate::collaborators::{
    AnalyticsSink, GeoLookup, InMemoryAnalytics, NoopGeoLookup, NoopNotifier, NotificationDispatcher,
    METRIC_LEADS_CREATED, METRIC_MQL_LEADS,
};
use crate::in_flight::InFlightSubmissions;
use crate::{AllocationStatus, IntakeConfig, IntakeError, IntakeOutcome, LeadNotice, SubmissionValidator};
use leadflow_distribution::{AllocationError, RoundRobinAllocator};
use leadflow_domain::traits::{DistributionRuleStore, FormRegistry, LeadQuery, LeadStore, PipelineRegistry};
use leadflow_domain::{
    Assignment, AttributionResolver, Lead, LeadId, ScoringEngine, StageTransition, Submission,
    TemperatureThresholds,
};
use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinSet;

/// Turns submissions into scored, attributed and assigned leads
///
/// # Examples
///
/// ```no_run
/// use leadflow_distribution::{DistributionConfig, RoundRobinAllocator};
/// use leadflow_domain::{Submission, TemperatureThresholds};
/// use leadflow_intake::{IntakeConfig, IntakeCoordinator};
/// use leadflow_store::SqliteStore;
/// use std::sync::Arc;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let store = Arc::new(SqliteStore::new("leadflow.db")?);
/// let allocator = Arc::new(RoundRobinAllocator::new(Arc::clone(&store), DistributionConfig::default()));
/// let coordinator = IntakeCoordinator::new(
///     store,
///     allocator,
///     IntakeConfig::default(),
///     TemperatureThresholds::default(),
/// );
///
/// let submission = Submission::new("contact", leadflow_domain::now_millis()).with_field("email", "a@b.com");
/// let outcome = coordinator.submit(submission).await?;
/// println!("{} -> {}", outcome.lead.id, outcome.allocation.as_str());
/// # Ok(())
/// # }
/// ```
pub struct IntakeCoordinator<S> {
    store: Arc<S>,
    allocator: Arc<RoundRobinAllocator<S>>,
    resolver: AttributionResolver,
    validator: SubmissionValidator,
    thresholds: TemperatureThresholds,
    config: IntakeConfig,
    notifier: Arc<dyn NotificationDispatcher>,
    geo_lookup: Arc<dyn GeoLookup>,
    analytics: Arc<dyn AnalyticsSink>,
    side_effects: Mutex<JoinSet<()>>,
    in_flight: InFlightSubmissions,
}

impl<S> IntakeCoordinator<S>
where
    S: LeadStore + FormRegistry + PipelineRegistry + DistributionRuleStore + Send + Sync + 'static,
    <S as LeadStore>::Error: Display,
    <S as FormRegistry>::Error: Display,
    <S as PipelineRegistry>::Error: Display,
    <S as DistributionRuleStore>::Error: Display,
{
    /// Create a coordinator with no-op collaborators
    pub fn new(
        store: Arc<S>,
        allocator: Arc<RoundRobinAllocator<S>>,
        config: IntakeConfig,
        thresholds: TemperatureThresholds,
    ) -> Self {
        Self {
            store,
            allocator,
            resolver: AttributionResolver::new(config.source_name_table()),
            validator: SubmissionValidator::new(),
            thresholds,
            config,
            notifier: Arc::new(NoopNotifier),
            geo_lookup: Arc::new(NoopGeoLookup),
            analytics: Arc::new(InMemoryAnalytics::new()),
            side_effects: Mutex::new(JoinSet::new()),
            in_flight: InFlightSubmissions::default(),
        }
    }

    /// Use a notification dispatcher
    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationDispatcher>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Use a geo lookup
    pub fn with_geo_lookup(mut self, geo_lookup: Arc<dyn GeoLookup>) -> Self {
        self.geo_lookup = geo_lookup;
        self
    }

    /// Use an analytics sink
    pub fn with_analytics(mut self, analytics: Arc<dyn AnalyticsSink>) -> Self {
        self.analytics = analytics;
        self
    }

    /// Get the intake configuration
    pub fn config(&self) -> &IntakeConfig {
        &self.config
    }

    /// Get the temperature thresholds
    pub fn thresholds(&self) -> &TemperatureThresholds {
        &self.thresholds
    }

    /// Process a submission
    ///
    /// Validates it, replays an earlier result for a known submission id,
    /// otherwise builds the lead, allocates it, persists it and starts the
    /// best-effort side effects. Side effects never fail the call; wait for
    /// them with [`drain_side_effects`](Self::drain_side_effects).
    ///
    /// Concurrent calls with the same submission id run one after another,
    /// so only the first allocates.
    ///
    /// # Errors
    ///
    /// - [`IntakeError::Validation`] when the submission is rejected
    /// - [`IntakeError::Persistence`] when the lead could not be written
    /// - [`IntakeError::Allocation`] when the rotation cursor stayed contended
    ///   or the rule store failed
    /// - [`IntakeError::Store`] / [`IntakeError::Config`] for lookups that
    ///   failed or point at missing pipelines
    pub async fn submit(&self, submission: Submission) -> Result<IntakeOutcome, IntakeError> {
        let form = if submission.form_id.trim().is_empty() {
            None
        } else {
            self.store
                .form(&submission.form_id)
                .map_err(|e| IntakeError::Store(e.to_string()))?
        };

        let reasons = self.validator.validate(&submission, form.as_ref());
        let Some(form) = form.filter(|_| reasons.is_empty()) else {
            tracing::info!(
                submission_id = %submission.id,
                form_id = %submission.form_id,
                reasons = reasons.len(),
                "Rejected submission"
            );
            return Err(IntakeError::Validation(reasons.iter().map(ToString::to_string).collect()));
        };

        // Duplicates of a submission in flight wait here, then replay
        let _in_flight = self.in_flight.acquire(submission.id).await;

        if let Some(existing) = self.find_existing(&submission)? {
            tracing::info!(submission_id = %submission.id, lead_id = %existing.id, "Replaying known submission");
            return Ok(self.replay(existing, submission.timestamp));
        }

        let pipeline = self
            .store
            .pipeline(&form.pipeline_id)
            .map_err(|e| IntakeError::Store(e.to_string()))?
            .ok_or_else(|| {
                IntakeError::Config(format!("form {} references unknown pipeline {}", form.id, form.pipeline_id))
            })?;

        let origin = self.resolver.resolve(&form.tracking, &submission, &form.name);
        let engine = ScoringEngine::new(
            form.mql_threshold
                .unwrap_or(self.config.qualification_rules.mql_threshold),
        );
        let score = engine.evaluate(&form.scoring_rules, &submission.field_values);

        let mut lead = Lead::new_unassigned(
            submission.id,
            form.id.clone(),
            score.score,
            score.is_mql,
            origin,
            pipeline.id.clone(),
            pipeline.initial_stage().to_string(),
            submission.timestamp,
        );
        lead.refresh_temperature(&self.thresholds, submission.timestamp);

        let allocation = match self.allocator.assign(&pipeline.id, submission.timestamp) {
            Ok(Assignment::Assigned { member_id, slot }) => {
                lead.assigned_member_id = Some(member_id.clone());
                AllocationStatus::Assigned { member_id, slot }
            }
            Ok(Assignment::Unassigned(reason)) => AllocationStatus::Unassigned(reason),
            Err(AllocationError::Exhausted { pipeline_id }) => {
                tracing::warn!(lead_id = %lead.id, pipeline_id = %pipeline_id, "Lead needs manual assignment");
                AllocationStatus::Exhausted
            }
            Err(e) => {
                tracing::error!(submission_id = %submission.id, error = %e, "Allocation failed");
                return Err(e.into());
            }
        };

        if let Some(existing) = self.persist(&lead).await? {
            // A concurrent request for the same submission won the write
            return Ok(self.replay(existing, submission.timestamp));
        }

        tracing::info!(
            lead_id = %lead.id,
            submission_id = %submission.id,
            score = lead.score,
            is_mql = lead.is_mql,
            origin = %lead.origin.name,
            allocation = allocation.as_str(),
            "Created lead"
        );

        self.spawn_side_effects(&lead, &allocation, submission.client_ip.as_deref());

        Ok(IntakeOutcome {
            lead,
            allocation,
            replayed: false,
            score_breakdown: score.breakdown,
        })
    }

    /// Read a lead with its temperature recomputed at `now`
    ///
    /// A changed tier is written back on a best-effort basis.
    pub fn read_lead(&self, id: LeadId, now: u64) -> Result<Lead, IntakeError> {
        let mut lead = self
            .store
            .read(id)
            .map_err(|e| IntakeError::Store(e.to_string()))?
            .ok_or_else(|| IntakeError::NotFound(id.to_string()))?;

        self.reclassify(&mut lead, now);
        Ok(lead)
    }

    /// List leads with temperatures recomputed at `now`
    ///
    /// A tier filter matches the recomputed tier, not the stored tag, so
    /// paging is applied after reclassification in that case.
    pub fn list_leads(&self, query: &LeadQuery, now: u64) -> Result<Vec<Lead>, IntakeError> {
        let Some(tier) = query.tier else {
            let mut leads = self
                .store
                .list(query)
                .map_err(|e| IntakeError::Store(e.to_string()))?;
            for lead in &mut leads {
                self.reclassify(lead, now);
            }
            return Ok(leads);
        };

        let pipeline_only = LeadQuery {
            pipeline_id: query.pipeline_id.clone(),
            ..Default::default()
        };
        let mut leads = self
            .store
            .list(&pipeline_only)
            .map_err(|e| IntakeError::Store(e.to_string()))?;
        for lead in &mut leads {
            self.reclassify(lead, now);
        }

        Ok(leads
            .into_iter()
            .filter(|lead| lead.temperature_tier == tier)
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .collect())
    }

    /// Move a lead to another stage of its pipeline
    ///
    /// Entering the pipeline's initial stage restarts the temperature clock.
    pub fn move_stage(&self, id: LeadId, stage_id: &str, at: u64) -> Result<Lead, IntakeError> {
        let lead = self
            .store
            .read(id)
            .map_err(|e| IntakeError::Store(e.to_string()))?
            .ok_or_else(|| IntakeError::NotFound(id.to_string()))?;

        let pipeline = self
            .store
            .pipeline(&lead.pipeline_id)
            .map_err(|e| IntakeError::Store(e.to_string()))?
            .ok_or_else(|| IntakeError::Config(format!("lead {} references unknown pipeline {}", id, lead.pipeline_id)))?;

        if !pipeline.has_stage(stage_id) {
            return Err(IntakeError::InvalidStage {
                stage_id: stage_id.to_string(),
                pipeline_id: pipeline.id,
            });
        }

        // Stage entry times only move forward
        if at < lead.current_stage_entry_time {
            return Err(IntakeError::StageTimeRegression {
                at,
                current: lead.current_stage_entry_time,
            });
        }

        let transition = StageTransition {
            stage_id: stage_id.to_string(),
            is_initial_stage: pipeline.is_initial_stage(stage_id),
            at,
        };

        let mut moved = self
            .store
            .update_stage(id, &transition)
            .map_err(|e| IntakeError::Store(e.to_string()))?
            .ok_or_else(|| IntakeError::NotFound(id.to_string()))?;

        tracing::info!(lead_id = %id, from = %lead.stage_id, to = stage_id, "Moved lead");

        self.reclassify(&mut moved, at);
        Ok(moved)
    }

    /// Wait for every side effect started so far
    pub async fn drain_side_effects(&self) {
        let mut pending = {
            let mut tasks = self.side_effects.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *tasks)
        };

        while let Some(result) = pending.join_next().await {
            if let Err(e) = result {
                tracing::warn!(error = %e, "Side effect task panicked");
            }
        }
    }

    fn find_existing(&self, submission: &Submission) -> Result<Option<Lead>, IntakeError> {
        self.store
            .find_by_submission(submission.id)
            .map_err(|e| IntakeError::Store(e.to_string()))
    }

    fn replay(&self, mut lead: Lead, now: u64) -> IntakeOutcome {
        lead.refresh_temperature(&self.thresholds, now);
        IntakeOutcome {
            lead,
            allocation: AllocationStatus::Replayed,
            replayed: true,
            score_breakdown: Vec::new(),
        }
    }

    fn reclassify(&self, lead: &mut Lead, now: u64) {
        let stored = lead.temperature_tier;
        let tier = lead.refresh_temperature(&self.thresholds, now);
        if tier != stored {
            if let Err(e) = self.store.update_temperature(lead.id, tier) {
                tracing::warn!(lead_id = %lead.id, error = %e, "Failed to store recomputed temperature");
            }
        }
    }

    /// Write the lead, retrying with backoff
    ///
    /// Returns the already stored lead when another request for the same
    /// submission wrote first.
    async fn persist(&self, lead: &Lead) -> Result<Option<Lead>, IntakeError> {
        let attempts = self.config.persistence_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let error = match self.store.create(lead) {
                Ok(()) => return Ok(None),
                Err(e) => e.to_string(),
            };

            if let Ok(Some(existing)) = self.store.find_by_submission(lead.submission_id) {
                if existing.id != lead.id {
                    return Ok(Some(existing));
                }
            }

            if attempt == attempts {
                tracing::error!(lead_id = %lead.id, attempts, error = %error, "Giving up on lead write");
                return Err(IntakeError::Persistence {
                    attempts,
                    message: error,
                });
            }

            tracing::warn!(lead_id = %lead.id, attempt, error = %error, "Lead write failed, retrying");
            tokio::time::sleep(retry_delay(attempt)).await;
        }
    }

    fn spawn_side_effects(&self, lead: &Lead, allocation: &AllocationStatus, client_ip: Option<&str>) {
        let timeout = self.config.side_effect_timeout();
        let notice = Arc::new(LeadNotice::new(lead, allocation));

        {
            let store = Arc::clone(&self.store);
            let (lead_id, stage_id, at) = (lead.id, lead.stage_id.clone(), lead.current_stage_entry_time);
            self.spawn("pipeline_history", timeout, async move {
                store
                    .record_stage_entry(lead_id, &stage_id, at)
                    .map_err(|e| e.to_string())
            });
        }

        {
            let notifier = Arc::clone(&self.notifier);
            let notice = Arc::clone(&notice);
            self.spawn("notification", timeout, async move {
                notifier.notify(&notice).await.map_err(|e| e.to_string())
            });
        }

        {
            let analytics = Arc::clone(&self.analytics);
            let notice = Arc::clone(&notice);
            self.spawn("analytics", timeout, async move {
                analytics
                    .increment(METRIC_LEADS_CREATED, &notice)
                    .await
                    .map_err(|e| e.to_string())?;
                if notice.is_mql {
                    analytics
                        .increment(METRIC_MQL_LEADS, &notice)
                        .await
                        .map_err(|e| e.to_string())?;
                }
                Ok(())
            });
        }

        if let Some(ip) = client_ip.map(str::trim).filter(|ip| !ip.is_empty()) {
            let store = Arc::clone(&self.store);
            let geo_lookup = Arc::clone(&self.geo_lookup);
            let (lead_id, ip) = (lead.id, ip.to_string());
            self.spawn("geo_lookup", timeout, async move {
                let location = geo_lookup.locate(&ip).await.map_err(|e| e.to_string())?;
                let Some(location) = location else {
                    // Stays "unknown"
                    return Ok(());
                };
                store
                    .update_location(lead_id, &location)
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            });
        }
    }

    fn spawn<F>(&self, name: &'static str, timeout: Duration, task: F)
    where
        F: Future<Output = Result<(), String>> + Send + 'static,
    {
        let mut tasks = self.side_effects.lock().unwrap_or_else(PoisonError::into_inner);
        // Reap finished tasks so the set only holds pending work
        while tasks.try_join_next().is_some() {}

        tasks.spawn(async move {
            match tokio::time::timeout(timeout, task).await {
                Ok(Ok(())) => tracing::debug!(side_effect = name, "Side effect completed"),
                Ok(Err(e)) => tracing::warn!(side_effect = name, error = %e, "Side effect failed"),
                Err(_) => tracing::warn!(side_effect = name, ?timeout, "Side effect timed out"),
            }
        });
    }
}

const RETRY_BASE_MS: u64 = 25;
const RETRY_MAX_MS: u64 = 2_000;

/// Backoff before the write attempt following `attempt`
fn retry_delay(attempt: u32) -> Duration {
    let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
    Duration::from_millis(RETRY_BASE_MS.saturating_mul(factor).min(RETRY_MAX_MS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_delay_doubles() {
        assert_eq!(retry_delay(1), Duration::from_millis(25));
        assert_eq!(retry_delay(2), Duration::from_millis(50));
        assert_eq!(retry_delay(4), Duration::from_millis(200));
    }

    #[test]
    fn test_retry_delay_is_capped() {
        assert_eq!(retry_delay(8), Duration::from_millis(RETRY_MAX_MS));
        assert_eq!(retry_delay(64), Duration::from_millis(RETRY_MAX_MS));
        assert_eq!(retry_delay(u32::MAX), Duration::from_millis(RETRY_MAX_MS));
    }
}
