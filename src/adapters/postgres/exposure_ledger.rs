//! PostgreSQL implementation of ExposureLedger.
//!
//! Uniqueness of (item, instance) is enforced by the
//! `exposures_item_instance_key` constraint; the answered mutation is
//! guarded by `outcome = 'viewed'` so it applies at most once.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::exposure::{
    ExposureOutcome, ExposureRecord, ExposureResult, ItemExposureStats, NewExposure,
};
use crate::domain::foundation::{
    CandidateId, ExposureId, InstanceId, ItemId, OrganizationId, Timestamp,
};
use crate::ports::{ExposureLedger, LedgerError};

const UNIQUE_ITEM_INSTANCE: &str = "exposures_item_instance_key";

/// PostgreSQL implementation of the ExposureLedger port.
pub struct PostgresExposureLedger {
    pool: PgPool,
}

impl PostgresExposureLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of an exposure.
#[derive(Debug, sqlx::FromRow)]
struct ExposureRow {
    id: Uuid,
    item_id: String,
    candidate_id: String,
    instance_id: Uuid,
    organization_id: String,
    used_at: DateTime<Utc>,
    outcome: String,
    result: String,
}

impl TryFrom<ExposureRow> for ExposureRecord {
    type Error = LedgerError;

    fn try_from(row: ExposureRow) -> Result<Self, Self::Error> {
        Ok(ExposureRecord {
            id: ExposureId::from_uuid(row.id),
            item_id: ItemId::new(row.item_id).map_err(invalid_row)?,
            candidate_id: CandidateId::new(row.candidate_id).map_err(invalid_row)?,
            instance_id: InstanceId::from_uuid(row.instance_id),
            organization_id: OrganizationId::new(row.organization_id).map_err(invalid_row)?,
            used_at: Timestamp::from_datetime(row.used_at),
            outcome: parse_outcome(&row.outcome)?,
            result: parse_result(&row.result)?,
        })
    }
}

fn invalid_row(e: impl std::fmt::Display) -> LedgerError {
    LedgerError::Unavailable(format!("Invalid exposure row: {}", e))
}

fn parse_outcome(s: &str) -> Result<ExposureOutcome, LedgerError> {
    match s {
        "viewed" => Ok(ExposureOutcome::Viewed),
        "answered" => Ok(ExposureOutcome::Answered),
        _ => Err(invalid_row(format!("unknown outcome '{}'", s))),
    }
}

fn parse_result(s: &str) -> Result<ExposureResult, LedgerError> {
    match s {
        "correct" => Ok(ExposureResult::Correct),
        "incorrect" => Ok(ExposureResult::Incorrect),
        "skipped" => Ok(ExposureResult::Skipped),
        "none" => Ok(ExposureResult::None),
        _ => Err(invalid_row(format!("unknown result '{}'", s))),
    }
}

fn db_error(context: &str, e: sqlx::Error) -> LedgerError {
    LedgerError::Unavailable(format!("{}: {}", context, e))
}

fn id_strings(item_ids: &[ItemId]) -> Vec<String> {
    item_ids.iter().map(|id| id.as_str().to_string()).collect()
}

#[async_trait]
impl ExposureLedger for PostgresExposureLedger {
    async fn record(&self, exposure: NewExposure) -> Result<ExposureRecord, LedgerError> {
        let record = ExposureRecord::from_new(ExposureId::new(), exposure);

        sqlx::query(
            r#"
            INSERT INTO exposures (
                id, item_id, candidate_id, instance_id, organization_id,
                used_at, outcome, result
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.item_id.as_str())
        .bind(record.candidate_id.as_str())
        .bind(record.instance_id.as_uuid())
        .bind(record.organization_id.as_str())
        .bind(record.used_at.as_datetime())
        .bind(record.outcome.as_str())
        .bind(record.result.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.constraint() == Some(UNIQUE_ITEM_INSTANCE) {
                    return LedgerError::duplicate(&record.item_id, &record.instance_id);
                }
            }
            db_error("Failed to record exposure", e)
        })?;

        Ok(record)
    }

    async fn mark_answered(
        &self,
        item_id: &ItemId,
        instance_id: &InstanceId,
        result: ExposureResult,
    ) -> Result<ExposureRecord, LedgerError> {
        let row: Option<ExposureRow> = sqlx::query_as(
            r#"
            UPDATE exposures SET outcome = 'answered', result = $3
            WHERE item_id = $1 AND instance_id = $2 AND outcome = 'viewed'
            RETURNING id, item_id, candidate_id, instance_id, organization_id,
                      used_at, outcome, result
            "#,
        )
        .bind(item_id.as_str())
        .bind(instance_id.as_uuid())
        .bind(result.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to mark exposure answered", e))?;

        if let Some(row) = row {
            return ExposureRecord::try_from(row);
        }

        // Nothing updated: either already answered or never recorded.
        let exists: Option<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM exposures WHERE item_id = $1 AND instance_id = $2",
        )
        .bind(item_id.as_str())
        .bind(instance_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to look up exposure", e))?;

        match exists {
            Some(_) => Err(LedgerError::duplicate(item_id, instance_id)),
            None => Err(LedgerError::not_found(item_id, instance_id)),
        }
    }

    async fn history(
        &self,
        candidate_id: &CandidateId,
        item_id: Option<&ItemId>,
    ) -> Result<Vec<ExposureRecord>, LedgerError> {
        let rows: Vec<ExposureRow> = sqlx::query_as(
            r#"
            SELECT id, item_id, candidate_id, instance_id, organization_id,
                   used_at, outcome, result
            FROM exposures
            WHERE candidate_id = $1 AND ($2::TEXT IS NULL OR item_id = $2)
            ORDER BY used_at ASC, id ASC
            "#,
        )
        .bind(candidate_id.as_str())
        .bind(item_id.map(ItemId::as_str))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to load exposure history", e))?;

        rows.into_iter().map(ExposureRecord::try_from).collect()
    }

    async fn org_exposure_counts(
        &self,
        organization_id: &OrganizationId,
        item_ids: &[ItemId],
        window_start: Option<Timestamp>,
    ) -> Result<HashMap<ItemId, u32>, LedgerError> {
        if item_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT item_id, COUNT(DISTINCT candidate_id)::BIGINT
            FROM exposures
            WHERE organization_id = $1
              AND item_id = ANY($2)
              AND ($3::TIMESTAMPTZ IS NULL OR used_at >= $3)
            GROUP BY item_id
            "#,
        )
        .bind(organization_id.as_str())
        .bind(id_strings(item_ids))
        .bind(window_start.map(|t| *t.as_datetime()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to count organization exposures", e))?;

        rows.into_iter()
            .map(|(item_id, count)| {
                let item_id = ItemId::new(item_id).map_err(invalid_row)?;
                Ok((item_id, u32::try_from(count).unwrap_or(u32::MAX)))
            })
            .collect()
    }

    async fn item_exposure_stats(
        &self,
        item_ids: &[ItemId],
    ) -> Result<HashMap<ItemId, ItemExposureStats>, LedgerError> {
        if item_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<(String, Option<DateTime<Utc>>, i64)> = sqlx::query_as(
            r#"
            SELECT item_id, MAX(used_at), COUNT(*)::BIGINT
            FROM exposures
            WHERE item_id = ANY($1)
            GROUP BY item_id
            "#,
        )
        .bind(id_strings(item_ids))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to load item exposure stats", e))?;

        rows.into_iter()
            .map(|(item_id, last, total)| {
                let item_id = ItemId::new(item_id).map_err(invalid_row)?;
                let stats = ItemExposureStats {
                    last_exposed_at: last.map(Timestamp::from_datetime),
                    total_exposures: u32::try_from(total).unwrap_or(u32::MAX),
                };
                Ok((item_id, stats))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stored_outcomes_and_results() {
        assert_eq!(parse_outcome("viewed").unwrap(), ExposureOutcome::Viewed);
        assert_eq!(parse_outcome("answered").unwrap(), ExposureOutcome::Answered);
        assert!(parse_outcome("opened").is_err());
        assert_eq!(parse_result("skipped").unwrap(), ExposureResult::Skipped);
        assert!(parse_result("").is_err());
    }

    #[test]
    fn row_with_empty_item_id_is_rejected() {
        let row = ExposureRow {
            id: Uuid::new_v4(),
            item_id: String::new(),
            candidate_id: "c1".to_string(),
            instance_id: Uuid::new_v4(),
            organization_id: "acme".to_string(),
            used_at: Utc::now(),
            outcome: "viewed".to_string(),
            result: "none".to_string(),
        };
        assert!(ExposureRecord::try_from(row).is_err());
    }

    async fn live_ledger() -> PostgresExposureLedger {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = PgPool::connect(&url).await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        PostgresExposureLedger::new(pool)
    }

    #[tokio::test]
    #[ignore] // Run with: DATABASE_URL=... cargo test -- --ignored
    async fn duplicate_write_hits_unique_constraint() {
        let ledger = live_ledger().await;
        let exposure = NewExposure::viewed(
            ItemId::new(format!("q-{}", Uuid::new_v4())).unwrap(),
            CandidateId::new("c1").unwrap(),
            InstanceId::new(),
            OrganizationId::new("acme").unwrap(),
            Timestamp::now(),
        );

        ledger.record(exposure.clone()).await.unwrap();
        let second = ledger.record(exposure.clone()).await;
        assert!(matches!(second, Err(LedgerError::DuplicateWrite { .. })));

        ledger
            .mark_answered(&exposure.item_id, &exposure.instance_id, ExposureResult::Correct)
            .await
            .unwrap();
        let again = ledger
            .mark_answered(&exposure.item_id, &exposure.instance_id, ExposureResult::Correct)
            .await;
        assert!(matches!(again, Err(LedgerError::DuplicateWrite { .. })));
    }
}
