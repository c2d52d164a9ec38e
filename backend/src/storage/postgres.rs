//! PostgreSQL audit store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{AuditFilter, AuditStore, StatusSample};
use crate::error::{AppError, Result};
use crate::models::audit_event::AuditEventRecord;
use crate::models::audit_record::{
    AuditRecord, ReviewOutcome, ReviewStatus, ReviewTransition, SourceCitation,
};

const RECORD_COLUMNS: &str = r#"
    id, user_id, prompt, response, sources, confidence_score,
    policy_flag, policy_violations, status, reviewer_id, review_comments,
    edited_response, reviewed_at, language, pinned, custom_title, created_at
"#;

/// Row shape of `audit_logs`.
#[derive(Debug, sqlx::FromRow)]
struct AuditRecordRow {
    id: Uuid,
    user_id: Option<String>,
    prompt: String,
    response: String,
    sources: Json<Vec<SourceCitation>>,
    confidence_score: f64,
    policy_flag: bool,
    policy_violations: Json<Vec<String>>,
    status: String,
    reviewer_id: Option<String>,
    review_comments: Option<String>,
    edited_response: Option<String>,
    reviewed_at: Option<DateTime<Utc>>,
    language: String,
    pinned: bool,
    custom_title: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<AuditRecordRow> for AuditRecord {
    type Error = AppError;

    fn try_from(row: AuditRecordRow) -> Result<Self> {
        let status = ReviewStatus::parse(&row.status).ok_or_else(|| {
            AppError::Database(format!(
                "audit log {} has unknown status '{}'",
                row.id, row.status
            ))
        })?;
        Ok(AuditRecord {
            id: row.id,
            user_id: row.user_id,
            prompt: row.prompt,
            response: row.response,
            sources: row.sources.0,
            confidence_score: row.confidence_score,
            policy_flag: row.policy_flag,
            policy_violations: row.policy_violations.0,
            status,
            reviewer_id: row.reviewer_id,
            review_comments: row.review_comments,
            edited_response: row.edited_response,
            reviewed_at: row.reviewed_at,
            created_at: row.created_at,
            pinned: row.pinned,
            custom_title: row.custom_title,
            language: row.language,
        })
    }
}

/// Audit store over the `audit_logs` and `audit_events` tables.
pub struct PostgresAuditStore {
    db: PgPool,
}

impl PostgresAuditStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// Writes `event` inside the caller's transaction. A failure here aborts the
/// whole transaction, so the mutation it documents is rolled back with it.
async fn insert_event(tx: &mut Transaction<'_, Postgres>, event: &AuditEventRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO audit_events (id, record_id, action, actor, details, correlation_id, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(event.id)
    .bind(event.record_id)
    .bind(&event.action)
    .bind(&event.actor)
    .bind(&event.details)
    .bind(&event.correlation_id)
    .bind(event.created_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            AppError::Conflict(format!("Audit event {} already exists", event.id))
        }
        _ => AppError::Database(e.to_string()),
    })?;

    Ok(())
}

#[async_trait]
impl AuditStore for PostgresAuditStore {
    async fn insert(&self, record: &AuditRecord, event: &AuditEventRecord) -> Result<()> {
        let mut tx = self.db.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO audit_logs (
                id, user_id, prompt, response, sources, confidence_score,
                policy_flag, policy_violations, status, language, pinned,
                custom_title, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(record.id)
        .bind(&record.user_id)
        .bind(&record.prompt)
        .bind(&record.response)
        .bind(Json(&record.sources))
        .bind(record.confidence_score)
        .bind(record.policy_flag)
        .bind(Json(&record.policy_violations))
        .bind(record.status.as_str())
        .bind(&record.language)
        .bind(record.pinned)
        .bind(&record.custom_title)
        .bind(record.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(format!("Audit log {} already exists", record.id))
            }
            _ => AppError::Database(e.to_string()),
        })?;

        insert_event(&mut tx, event).await?;
        tx.commit().await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<AuditRecord>> {
        let row = sqlx::query_as::<_, AuditRecordRow>(&format!(
            "SELECT {} FROM audit_logs WHERE id = $1",
            RECORD_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(AuditRecord::try_from).transpose()
    }

    async fn list(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>> {
        let rows = sqlx::query_as::<_, AuditRecordRow>(&format!(
            r#"
            SELECT {}
            FROM audit_logs
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR user_id = $2)
              AND ($3::boolean IS NULL OR policy_flag = $3)
            ORDER BY pinned DESC, created_at DESC
            LIMIT $4
            "#,
            RECORD_COLUMNS
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(&filter.user_id)
        .bind(filter.policy_flag)
        .bind(filter.limit)
        .fetch_all(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(AuditRecord::try_from).collect()
    }

    async fn apply_review(
        &self,
        id: Uuid,
        outcome: &ReviewOutcome,
        event: &AuditEventRecord,
    ) -> Result<ReviewTransition> {
        let mut tx = self.db.begin().await?;

        // The status predicate makes this a compare-and-set: concurrent
        // reviewers race on the row lock and only the first sees 'pending'.
        let updated = sqlx::query_as::<_, AuditRecordRow>(&format!(
            r#"
            UPDATE audit_logs
            SET status = $2,
                reviewer_id = $3,
                review_comments = $4,
                edited_response = $5,
                reviewed_at = $6
            WHERE id = $1 AND status = 'pending'
            RETURNING {}
            "#,
            RECORD_COLUMNS
        ))
        .bind(id)
        .bind(outcome.decision.resulting_status().as_str())
        .bind(&outcome.reviewer_id)
        .bind(&outcome.comments)
        .bind(&outcome.edited_response)
        .bind(outcome.reviewed_at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        if let Some(row) = updated {
            let record = AuditRecord::try_from(row)?;
            insert_event(&mut tx, event).await?;
            tx.commit().await?;
            return Ok(ReviewTransition::Applied(record));
        }
        tx.rollback().await?;

        Ok(match self.get(id).await? {
            Some(current) => ReviewTransition::AlreadyReviewed(current),
            None => ReviewTransition::NotFound,
        })
    }

    async fn set_pinned(&self, id: Uuid, pinned: bool, event: &AuditEventRecord) -> Result<bool> {
        let mut tx = self.db.begin().await?;

        let result = sqlx::query("UPDATE audit_logs SET pinned = $2 WHERE id = $1")
            .bind(id)
            .bind(pinned)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }
        insert_event(&mut tx, event).await?;
        tx.commit().await?;

        Ok(true)
    }

    async fn set_title(&self, id: Uuid, title: &str, event: &AuditEventRecord) -> Result<bool> {
        let mut tx = self.db.begin().await?;

        let result = sqlx::query("UPDATE audit_logs SET custom_title = $2 WHERE id = $1")
            .bind(id)
            .bind(title)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }
        insert_event(&mut tx, event).await?;
        tx.commit().await?;

        Ok(true)
    }

    async fn delete(&self, id: Uuid, event: &AuditEventRecord) -> Result<bool> {
        let mut tx = self.db.begin().await?;

        let result = sqlx::query("DELETE FROM audit_logs WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }
        insert_event(&mut tx, event).await?;
        tx.commit().await?;

        Ok(true)
    }

    async fn recent_statuses(&self, limit: i64) -> Result<Vec<StatusSample>> {
        let rows: Vec<(String, bool)> = sqlx::query_as(
            r#"
            SELECT status, policy_flag
            FROM audit_logs
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter()
            .map(|(status, policy_flag)| {
                let status = ReviewStatus::parse(&status).ok_or_else(|| {
                    AppError::Database(format!("unknown audit status '{}'", status))
                })?;
                Ok(StatusSample {
                    status,
                    policy_flag,
                })
            })
            .collect()
    }

    async fn events_for(&self, record_id: Uuid) -> Result<Vec<AuditEventRecord>> {
        let events = sqlx::query_as::<_, AuditEventRecord>(
            r#"
            SELECT id, record_id, action, actor, details, correlation_id, created_at
            FROM audit_events
            WHERE record_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(record_id)
        .fetch_all(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(events)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
