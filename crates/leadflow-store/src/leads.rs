//! Lead persistence

use crate::{conversion_error, SqliteStore, StoreError};
use leadflow_domain::traits::{LeadQuery, LeadStore, StageHistoryEntry};
use leadflow_domain::{Lead, LeadId, Origin, SourceType, StageTransition, SubmissionId, TemperatureTier};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

const LEAD_COLUMNS: &str = "id, submission_id, form_id, score, is_mql, temperature_tier, \
     origin_name, origin_source_type, origin_source, origin_medium, origin_campaign, origin_content, origin_term, \
     referrer, landing_page, assigned_member_id, pipeline_id, stage_id, location, \
     created_at, initial_stage_entry_time, current_stage_entry_time";

impl SqliteStore {
    fn lead_from_row(row: &Row<'_>) -> rusqlite::Result<Lead> {
        let id_bytes: Vec<u8> = row.get(0)?;
        let id = Self::bytes_to_lead_id(&id_bytes).map_err(|e| conversion_error(0, Type::Blob, e))?;

        let submission_raw: String = row.get(1)?;
        let submission_id = SubmissionId::from_string(&submission_raw)
            .map_err(|e| conversion_error(1, Type::Text, StoreError::InvalidData(e)))?;

        let tier_raw: String = row.get(5)?;
        let temperature_tier = TemperatureTier::parse(&tier_raw).ok_or_else(|| {
            conversion_error(5, Type::Text, StoreError::InvalidData(format!("Unknown tier: {}", tier_raw)))
        })?;

        let source_type_raw: String = row.get(7)?;
        let source_type = SourceType::parse(&source_type_raw).ok_or_else(|| {
            conversion_error(
                7,
                Type::Text,
                StoreError::InvalidData(format!("Unknown source type: {}", source_type_raw)),
            )
        })?;

        Ok(Lead {
            id,
            submission_id,
            form_id: row.get(2)?,
            score: row.get::<_, i64>(3)?.clamp(0, 100) as u8,
            is_mql: row.get(4)?,
            temperature_tier,
            origin: Origin {
                name: row.get(6)?,
                source_type,
                source: row.get(8)?,
                medium: row.get(9)?,
                campaign: row.get(10)?,
                content: row.get(11)?,
                term: row.get(12)?,
                referrer: row.get(13)?,
                landing_page: row.get(14)?,
            },
            assigned_member_id: row.get(15)?,
            pipeline_id: row.get(16)?,
            stage_id: row.get(17)?,
            location: row.get(18)?,
            created_at: row.get::<_, i64>(19)? as u64,
            initial_stage_entry_time: row.get::<_, i64>(20)? as u64,
            current_stage_entry_time: row.get::<_, i64>(21)? as u64,
        })
    }

    fn read_with(conn: &Connection, id: LeadId) -> Result<Option<Lead>, StoreError> {
        let sql = format!("SELECT {} FROM leads WHERE id = ?1", LEAD_COLUMNS);
        let lead = conn
            .query_row(&sql, params![Self::lead_id_to_bytes(id)], Self::lead_from_row)
            .optional()?;
        Ok(lead)
    }
}

impl LeadStore for SqliteStore {
    type Error = StoreError;

    fn create(&self, lead: &Lead) -> Result<(), Self::Error> {
        let conn = self.lock()?;
        let sql = format!(
            "INSERT INTO leads ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, \
             ?16, ?17, ?18, ?19, ?20, ?21, ?22) ON CONFLICT(id) DO NOTHING",
            LEAD_COLUMNS
        );

        let inserted = conn
            .execute(
                &sql,
                params![
                    Self::lead_id_to_bytes(lead.id),
                    lead.submission_id.to_string(),
                    &lead.form_id,
                    i64::from(lead.score),
                    lead.is_mql,
                    lead.temperature_tier.as_str(),
                    &lead.origin.name,
                    lead.origin.source_type.as_str(),
                    &lead.origin.source,
                    &lead.origin.medium,
                    &lead.origin.campaign,
                    &lead.origin.content,
                    &lead.origin.term,
                    &lead.origin.referrer,
                    &lead.origin.landing_page,
                    &lead.assigned_member_id,
                    &lead.pipeline_id,
                    &lead.stage_id,
                    &lead.location,
                    lead.created_at as i64,
                    lead.initial_stage_entry_time as i64,
                    lead.current_stage_entry_time as i64,
                ],
            )
            .map_err(|e| StoreError::from_write(e, "lead"))?;

        if inserted == 0 {
            tracing::debug!(lead_id = %lead.id, "Lead already persisted, create is a no-op");
        }

        Ok(())
    }

    fn read(&self, id: LeadId) -> Result<Option<Lead>, Self::Error> {
        let conn = self.lock()?;
        Self::read_with(&conn, id)
    }

    fn find_by_submission(&self, submission_id: SubmissionId) -> Result<Option<Lead>, Self::Error> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM leads WHERE submission_id = ?1", LEAD_COLUMNS);
        let lead = conn
            .query_row(&sql, params![submission_id.to_string()], Self::lead_from_row)
            .optional()?;
        Ok(lead)
    }

    fn update_stage(&self, id: LeadId, transition: &StageTransition) -> Result<Option<Lead>, Self::Error> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let Some(mut lead) = Self::read_with(&tx, id)? else {
            return Ok(None);
        };
        lead.apply_transition(transition);

        let id_bytes = Self::lead_id_to_bytes(id);
        tx.execute(
            "UPDATE leads SET stage_id = ?2, initial_stage_entry_time = ?3, current_stage_entry_time = ?4
             WHERE id = ?1",
            params![
                &id_bytes,
                &lead.stage_id,
                lead.initial_stage_entry_time as i64,
                lead.current_stage_entry_time as i64,
            ],
        )?;
        tx.execute(
            "INSERT INTO lead_stage_history (lead_id, stage_id, entered_at) VALUES (?1, ?2, ?3)",
            params![&id_bytes, &transition.stage_id, transition.at as i64],
        )?;

        tx.commit()?;
        Ok(Some(lead))
    }

    fn list(&self, query: &LeadQuery) -> Result<Vec<Lead>, Self::Error> {
        let mut sql = format!("SELECT {} FROM leads WHERE 1=1", LEAD_COLUMNS);
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(pipeline_id) = &query.pipeline_id {
            sql.push_str(" AND pipeline_id = ?");
            params.push(Box::new(pipeline_id.clone()));
        }

        if let Some(tier) = query.tier {
            sql.push_str(" AND temperature_tier = ?");
            params.push(Box::new(tier.as_str()));
        }

        // UUIDv7 bytes sort chronologically
        sql.push_str(" ORDER BY id");

        if query.limit.is_some() || query.offset.is_some() {
            sql.push_str(" LIMIT ? OFFSET ?");
            params.push(Box::new(query.limit.map(|l| l as i64).unwrap_or(-1)));
            params.push(Box::new(query.offset.unwrap_or(0) as i64));
        }

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let leads = stmt
            .query_map(&param_refs[..], Self::lead_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(leads)
    }

    fn update_temperature(&self, id: LeadId, tier: TemperatureTier) -> Result<bool, Self::Error> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE leads SET temperature_tier = ?2 WHERE id = ?1",
            params![Self::lead_id_to_bytes(id), tier.as_str()],
        )?;
        Ok(updated > 0)
    }

    fn update_location(&self, id: LeadId, location: &str) -> Result<bool, Self::Error> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE leads SET location = ?2 WHERE id = ?1",
            params![Self::lead_id_to_bytes(id), location],
        )?;
        Ok(updated > 0)
    }

    fn record_stage_entry(&self, id: LeadId, stage_id: &str, at: u64) -> Result<(), Self::Error> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO lead_stage_history (lead_id, stage_id, entered_at) VALUES (?1, ?2, ?3)",
            params![Self::lead_id_to_bytes(id), stage_id, at as i64],
        )
        .map_err(|e| match StoreError::from_write(e, "stage history") {
            // The only constraint on this table is the lead foreign key
            StoreError::Duplicate(_) => StoreError::NotFound(format!("lead {}", id)),
            other => other,
        })?;
        Ok(())
    }

    fn stage_history(&self, id: LeadId) -> Result<Vec<StageHistoryEntry>, Self::Error> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT stage_id, entered_at FROM lead_stage_history WHERE lead_id = ?1 ORDER BY id",
        )?;
        let entries = stmt
            .query_map(params![Self::lead_id_to_bytes(id)], |row| {
                Ok(StageHistoryEntry {
                    stage_id: row.get(0)?,
                    entered_at: row.get::<_, i64>(1)? as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}
