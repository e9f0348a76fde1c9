//! Pipelines, members, distribution rules and forms

use crate::{conversion_error, SqliteStore, StoreError};
use leadflow_domain::traits::{DistributionRuleStore, FormRegistry, PipelineRegistry};
use leadflow_domain::{
    Condition, CustomSource, DistributionMode, DistributionRule, FormDefinition, Pipeline, PipelineMember,
    ScoringRule, TrackingMode,
};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension};

impl SqliteStore {
    /// Insert or replace a pipeline and its stage list
    pub fn upsert_pipeline(&self, pipeline: &Pipeline) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO pipelines (id, name) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name",
            params![&pipeline.id, &pipeline.name],
        )?;
        tx.execute("DELETE FROM pipeline_stages WHERE pipeline_id = ?1", params![&pipeline.id])?;
        for (position, stage_id) in pipeline.stages.iter().enumerate() {
            tx.execute(
                "INSERT INTO pipeline_stages (pipeline_id, position, stage_id) VALUES (?1, ?2, ?3)",
                params![&pipeline.id, position as i64, stage_id],
            )
            .map_err(|e| StoreError::from_write(e, "pipeline stage"))?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Insert or update a pipeline member
    pub fn upsert_member(&self, pipeline_id: &str, member: &PipelineMember) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO pipeline_members (pipeline_id, member_id, is_active, join_order) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(pipeline_id, member_id) DO UPDATE SET
             is_active = excluded.is_active, join_order = excluded.join_order",
            params![pipeline_id, &member.id, member.is_active, i64::from(member.join_order)],
        )
        .map_err(|e| match StoreError::from_write(e, "member") {
            StoreError::Duplicate(_) => StoreError::NotFound(format!("pipeline {}", pipeline_id)),
            other => other,
        })?;
        Ok(())
    }

    /// Toggle a member's availability; returns false if the member is unknown
    pub fn set_member_active(&self, pipeline_id: &str, member_id: &str, is_active: bool) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE pipeline_members SET is_active = ?3 WHERE pipeline_id = ?1 AND member_id = ?2",
            params![pipeline_id, member_id, is_active],
        )?;
        Ok(updated > 0)
    }

    /// Remove a member from a pipeline; returns false if the member is unknown
    pub fn remove_member(&self, pipeline_id: &str, member_id: &str) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM pipeline_members WHERE pipeline_id = ?1 AND member_id = ?2",
            params![pipeline_id, member_id],
        )?;
        Ok(deleted > 0)
    }

    /// Insert or update a distribution rule
    ///
    /// The persisted rotation cursor survives updates: re-applying
    /// configuration at start-up must not restart the rotation. The cursor of
    /// `rule` is only used when the rule is first created.
    pub fn upsert_distribution_rule(&self, rule: &DistributionRule) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO distribution_rules
             (pipeline_id, mode, is_active, skip_inactive_members, fallback_to_manual, working_hours_only, rotation_cursor)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(pipeline_id) DO UPDATE SET
             mode = excluded.mode,
             is_active = excluded.is_active,
             skip_inactive_members = excluded.skip_inactive_members,
             fallback_to_manual = excluded.fallback_to_manual,
             working_hours_only = excluded.working_hours_only",
            params![
                &rule.pipeline_id,
                rule.mode.as_str(),
                rule.is_active,
                rule.skip_inactive_members,
                rule.fallback_to_manual,
                rule.working_hours_only,
                rule.rotation_cursor as i64,
            ],
        )
        .map_err(|e| match StoreError::from_write(e, "distribution rule") {
            StoreError::Duplicate(_) => StoreError::NotFound(format!("pipeline {}", rule.pipeline_id)),
            other => other,
        })?;
        Ok(())
    }

    /// Insert or replace a form definition with its rules and required fields
    pub fn upsert_form(&self, form: &FormDefinition) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let custom = match &form.tracking {
            TrackingMode::Custom(custom) => Some(custom),
            _ => None,
        };

        tx.execute(
            "INSERT INTO forms
             (id, name, pipeline_id, tracking_mode, custom_name, custom_source, custom_medium, custom_campaign, mql_threshold)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(id) DO UPDATE SET
             name = excluded.name,
             pipeline_id = excluded.pipeline_id,
             tracking_mode = excluded.tracking_mode,
             custom_name = excluded.custom_name,
             custom_source = excluded.custom_source,
             custom_medium = excluded.custom_medium,
             custom_campaign = excluded.custom_campaign,
             mql_threshold = excluded.mql_threshold",
            params![
                &form.id,
                &form.name,
                &form.pipeline_id,
                form.tracking.as_str(),
                custom.map(|c| c.name.clone()),
                custom.and_then(|c| c.source.clone()),
                custom.and_then(|c| c.medium.clone()),
                custom.and_then(|c| c.campaign.clone()),
                form.mql_threshold.map(i64::from),
            ],
        )
        .map_err(|e| match StoreError::from_write(e, "form") {
            StoreError::Duplicate(_) => StoreError::NotFound(format!("pipeline {}", form.pipeline_id)),
            other => other,
        })?;

        tx.execute("DELETE FROM scoring_rules WHERE form_id = ?1", params![&form.id])?;
        for (position, rule) in form.scoring_rules.iter().enumerate() {
            tx.execute(
                "INSERT INTO scoring_rules (form_id, position, field_id, condition, comparison_value, points)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    &form.id,
                    position as i64,
                    &rule.field_id,
                    rule.condition.as_str(),
                    &rule.comparison_value,
                    i64::from(rule.points),
                ],
            )?;
        }

        tx.execute("DELETE FROM form_required_fields WHERE form_id = ?1", params![&form.id])?;
        for field_id in &form.required_fields {
            tx.execute(
                "INSERT OR IGNORE INTO form_required_fields (form_id, field_id) VALUES (?1, ?2)",
                params![&form.id, field_id],
            )?;
        }

        tx.commit()?;
        Ok(())
    }
}

fn parse_mode(column: usize, raw: &str) -> rusqlite::Result<DistributionMode> {
    DistributionMode::parse(raw).ok_or_else(|| {
        conversion_error(
            column,
            Type::Text,
            StoreError::InvalidData(format!("Unknown distribution mode: {}", raw)),
        )
    })
}

impl DistributionRuleStore for SqliteStore {
    type Error = StoreError;

    fn distribution_rule(&self, pipeline_id: &str) -> Result<Option<DistributionRule>, Self::Error> {
        let conn = self.lock()?;
        let rule = conn
            .query_row(
                "SELECT pipeline_id, mode, is_active, skip_inactive_members, fallback_to_manual,
                        working_hours_only, rotation_cursor
                 FROM distribution_rules WHERE pipeline_id = ?1",
                params![pipeline_id],
                |row| {
                    let mode_raw: String = row.get(1)?;
                    Ok(DistributionRule {
                        pipeline_id: row.get(0)?,
                        mode: parse_mode(1, &mode_raw)?,
                        is_active: row.get(2)?,
                        skip_inactive_members: row.get(3)?,
                        fallback_to_manual: row.get(4)?,
                        working_hours_only: row.get(5)?,
                        rotation_cursor: row.get::<_, i64>(6)?.max(0) as u64,
                    })
                },
            )
            .optional()?;
        Ok(rule)
    }

    fn compare_and_swap_cursor(&self, pipeline_id: &str, expected: u64, new: u64) -> Result<bool, Self::Error> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE distribution_rules SET rotation_cursor = ?3
             WHERE pipeline_id = ?1 AND rotation_cursor = ?2",
            params![pipeline_id, expected as i64, new as i64],
        )?;
        Ok(updated == 1)
    }
}

impl PipelineRegistry for SqliteStore {
    type Error = StoreError;

    fn pipeline(&self, pipeline_id: &str) -> Result<Option<Pipeline>, Self::Error> {
        let conn = self.lock()?;
        let name: Option<String> = conn
            .query_row(
                "SELECT name FROM pipelines WHERE id = ?1",
                params![pipeline_id],
                |row| row.get(0),
            )
            .optional()?;

        let Some(name) = name else {
            return Ok(None);
        };

        let mut stmt =
            conn.prepare("SELECT stage_id FROM pipeline_stages WHERE pipeline_id = ?1 ORDER BY position")?;
        let stages = stmt
            .query_map(params![pipeline_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Pipeline::new(pipeline_id, name, stages).map(Some).map_err(StoreError::InvalidData)
    }

    fn members(&self, pipeline_id: &str) -> Result<Vec<PipelineMember>, Self::Error> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT member_id, is_active, join_order FROM pipeline_members
             WHERE pipeline_id = ?1 ORDER BY join_order, member_id",
        )?;
        let members = stmt
            .query_map(params![pipeline_id], |row| {
                Ok(PipelineMember {
                    id: row.get(0)?,
                    is_active: row.get(1)?,
                    join_order: row.get::<_, i64>(2)?.clamp(0, i64::from(u32::MAX)) as u32,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(members)
    }
}

impl FormRegistry for SqliteStore {
    type Error = StoreError;

    fn form(&self, form_id: &str) -> Result<Option<FormDefinition>, Self::Error> {
        let conn = self.lock()?;

        let row = conn
            .query_row(
                "SELECT name, pipeline_id, tracking_mode, custom_name, custom_source, custom_medium,
                        custom_campaign, mql_threshold
                 FROM forms WHERE id = ?1",
                params![form_id],
                |row| {
                    let mode: String = row.get(2)?;
                    let tracking = match mode.as_str() {
                        "disabled" => TrackingMode::Disabled,
                        "utm" => TrackingMode::Utm,
                        "form" => TrackingMode::Form,
                        "custom" => TrackingMode::Custom(CustomSource {
                            name: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                            source: row.get(4)?,
                            medium: row.get(5)?,
                            campaign: row.get(6)?,
                        }),
                        other => {
                            return Err(conversion_error(
                                2,
                                Type::Text,
                                StoreError::InvalidData(format!("Unknown tracking mode: {}", other)),
                            ))
                        }
                    };
                    let mql_threshold: Option<i64> = row.get(7)?;
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, tracking, mql_threshold))
                },
            )
            .optional()?;

        let Some((name, pipeline_id, tracking, mql_threshold)) = row else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            "SELECT field_id, condition, comparison_value, points FROM scoring_rules
             WHERE form_id = ?1 ORDER BY position",
        )?;
        let scoring_rules = stmt
            .query_map(params![form_id], |row| {
                let condition_raw: String = row.get(1)?;
                let condition = Condition::parse(&condition_raw).ok_or_else(|| {
                    conversion_error(
                        1,
                        Type::Text,
                        StoreError::InvalidData(format!("Unknown condition: {}", condition_raw)),
                    )
                })?;
                Ok(ScoringRule {
                    field_id: row.get(0)?,
                    condition,
                    comparison_value: row.get(2)?,
                    points: row.get::<_, i64>(3)?.clamp(0, i64::from(u32::MAX)) as u32,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt =
            conn.prepare("SELECT field_id FROM form_required_fields WHERE form_id = ?1 ORDER BY field_id")?;
        let required_fields = stmt
            .query_map(params![form_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(FormDefinition {
            id: form_id.to_string(),
            name,
            pipeline_id,
            tracking,
            scoring_rules,
            mql_threshold: mql_threshold.map(|t| t.clamp(0, i64::from(u32::MAX)) as u32),
            required_fields,
        }))
    }
}
