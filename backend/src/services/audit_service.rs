//! Audit record access and human review.
//!
//! Every mutation is stored together with the event that documents it on the
//! record's governance trail.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::audit_event::{AuditAction, AuditEvent, AuditEventRecord};
use crate::models::audit_record::{
    AuditRecord, ReviewDecision, ReviewOutcome, ReviewStatus, ReviewTransition,
};
use crate::services::metrics_service;
use crate::storage::{AuditFilter, AuditStore};

pub const DEFAULT_LIST_LIMIT: i64 = 20;
pub const MAX_LIST_LIMIT: i64 = 100;
pub const MAX_TITLE_CHARS: usize = 200;

/// A review as submitted by a reviewer, before validation.
#[derive(Debug, Clone)]
pub struct ReviewSubmission {
    pub decision: ReviewDecision,
    pub reviewer_id: String,
    pub comments: Option<String>,
    pub edited_response: Option<String>,
}

/// Result of a review request.
#[derive(Debug, Clone)]
pub struct ReviewResult {
    pub record: AuditRecord,
    /// False when the identical review had already been applied.
    pub applied: bool,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Validate a submission and turn it into an outcome a store can apply.
pub fn validate_review(submission: ReviewSubmission) -> Result<ReviewOutcome> {
    let reviewer_id = submission.reviewer_id.trim().to_string();
    if reviewer_id.is_empty() {
        return Err(AppError::Validation("reviewer_id must not be empty".into()));
    }

    let edited_response = match submission.decision {
        ReviewDecision::Edited => Some(non_blank(submission.edited_response).ok_or_else(|| {
            AppError::Validation("edited_response is required for an edited decision".into())
        })?),
        ReviewDecision::Approved | ReviewDecision::Rejected => {
            if submission.edited_response.is_some() {
                return Err(AppError::Validation(
                    "edited_response is only accepted with an edited decision".into(),
                ));
            }
            None
        }
    };

    Ok(ReviewOutcome {
        decision: submission.decision,
        reviewer_id,
        comments: non_blank(submission.comments),
        edited_response,
        reviewed_at: Utc::now(),
    })
}

/// Build a listing filter from raw query parameters.
pub fn build_filter(
    limit: Option<i64>,
    status: Option<&str>,
    user_id: Option<String>,
    policy_flag: Option<bool>,
) -> Result<AuditFilter> {
    let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT);
    if !(1..=MAX_LIST_LIMIT).contains(&limit) {
        return Err(AppError::Validation(format!(
            "limit must be between 1 and {}",
            MAX_LIST_LIMIT
        )));
    }
    let status = status
        .map(|s| {
            ReviewStatus::parse(s).ok_or_else(|| {
                AppError::Validation(format!(
                    "unknown status '{}'. Must be one of: pending, approved, rejected",
                    s
                ))
            })
        })
        .transpose()?;

    Ok(AuditFilter {
        limit,
        status,
        user_id,
        policy_flag,
    })
}

pub struct AuditService {
    store: Arc<dyn AuditStore>,
}

impl AuditService {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    fn not_found(id: Uuid) -> AppError {
        AppError::NotFound(format!("Audit log {} not found", id))
    }

    pub async fn get(&self, id: Uuid) -> Result<AuditRecord> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| Self::not_found(id))
    }

    pub async fn list(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>> {
        self.store.list(filter).await
    }

    /// Apply a review to a pending record.
    ///
    /// Re-submitting the review that already decided the record is accepted
    /// without change; any other review of a decided record is a conflict.
    pub async fn review(
        &self,
        id: Uuid,
        submission: ReviewSubmission,
        correlation_id: Option<String>,
    ) -> Result<ReviewResult> {
        let outcome = validate_review(submission)?;
        let event = AuditEvent::new(AuditAction::ReviewSubmitted, id)
            .actor(Some(outcome.reviewer_id.clone()))
            .details(json!({
                "decision": outcome.decision.as_str(),
                "status": outcome.decision.resulting_status().as_str(),
                "comments": outcome.comments,
                "edited": outcome.edited_response.is_some(),
            }))
            .correlation(correlation_id)
            .into_record();

        match self.store.apply_review(id, &outcome, &event).await? {
            ReviewTransition::Applied(record) => {
                metrics_service::record_review(outcome.decision.as_str());

                tracing::info!(
                    audit_id = %id,
                    decision = outcome.decision.as_str(),
                    reviewer_id = %outcome.reviewer_id,
                    "Review applied"
                );
                Ok(ReviewResult {
                    record,
                    applied: true,
                })
            }
            ReviewTransition::AlreadyReviewed(record) if outcome.is_reflected_in(&record) => {
                tracing::debug!(audit_id = %id, "Repeated review ignored");
                Ok(ReviewResult {
                    record,
                    applied: false,
                })
            }
            ReviewTransition::AlreadyReviewed(record) => {
                tracing::warn!(
                    audit_id = %id,
                    status = %record.status,
                    "Review rejected for already reviewed record"
                );
                Err(AppError::Conflict(format!(
                    "Audit log {} has already been reviewed (status: {})",
                    id, record.status
                )))
            }
            ReviewTransition::NotFound => Err(Self::not_found(id)),
        }
    }

    pub async fn set_pinned(
        &self,
        id: Uuid,
        pinned: bool,
        correlation_id: Option<String>,
    ) -> Result<()> {
        let action = if pinned {
            AuditAction::RecordPinned
        } else {
            AuditAction::RecordUnpinned
        };
        let event = AuditEvent::new(action, id)
            .correlation(correlation_id)
            .into_record();
        if !self.store.set_pinned(id, pinned, &event).await? {
            return Err(Self::not_found(id));
        }
        tracing::info!(audit_id = %id, pinned, "Audit log pin status updated");
        Ok(())
    }

    /// Set the display title; returns the stored (trimmed) title.
    pub async fn rename(
        &self,
        id: Uuid,
        title: &str,
        correlation_id: Option<String>,
    ) -> Result<String> {
        let title = title.trim();
        if title.is_empty() {
            return Err(AppError::Validation("custom_title must not be empty".into()));
        }
        if title.chars().count() > MAX_TITLE_CHARS {
            return Err(AppError::Validation(format!(
                "custom_title must be at most {} characters",
                MAX_TITLE_CHARS
            )));
        }

        let event = AuditEvent::new(AuditAction::RecordRenamed, id)
            .details(json!({ "custom_title": title }))
            .correlation(correlation_id)
            .into_record();
        if !self.store.set_title(id, title, &event).await? {
            return Err(Self::not_found(id));
        }
        tracing::info!(audit_id = %id, "Audit log renamed");
        Ok(title.to_string())
    }

    pub async fn delete(&self, id: Uuid, correlation_id: Option<String>) -> Result<()> {
        let event = AuditEvent::new(AuditAction::RecordDeleted, id)
            .correlation(correlation_id)
            .into_record();
        if !self.store.delete(id, &event).await? {
            return Err(Self::not_found(id));
        }
        tracing::info!(audit_id = %id, "Audit log deleted");
        Ok(())
    }

    /// Event trail of a record, oldest first. Available after deletion.
    pub async fn events(&self, id: Uuid) -> Result<Vec<AuditEventRecord>> {
        let events = self.store.events_for(id).await?;
        if events.is_empty() && self.store.get(id).await?.is_none() {
            return Err(Self::not_found(id));
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::audit_record::NewAuditRecord;
    use crate::storage::memory::MemoryAuditStore;

    async fn seeded() -> (AuditService, Uuid) {
        let store = Arc::new(MemoryAuditStore::new());
        let record = AuditRecord::pending(NewAuditRecord {
            user_id: Some("user-1".into()),
            prompt: "What is NLP?".into(),
            response: "NLP is a branch of AI.".into(),
            sources: vec![],
            confidence_score: 0.6,
            policy_violations: vec![],
            language: "en".into(),
        });
        let created = AuditEvent::new(AuditAction::RecordCreated, record.id).into_record();
        store.insert(&record, &created).await.unwrap();
        (AuditService::new(store), record.id)
    }

    fn submission(decision: ReviewDecision, reviewer: &str) -> ReviewSubmission {
        ReviewSubmission {
            decision,
            reviewer_id: reviewer.into(),
            comments: None,
            edited_response: None,
        }
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    #[test]
    fn test_validate_review_requires_reviewer() {
        let err = validate_review(submission(ReviewDecision::Approved, "  ")).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_validate_edited_requires_text() {
        let err = validate_review(ReviewSubmission {
            edited_response: Some("   ".into()),
            ..submission(ReviewDecision::Edited, "r")
        })
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let outcome = validate_review(ReviewSubmission {
            edited_response: Some("Fixed".into()),
            ..submission(ReviewDecision::Edited, "r")
        })
        .unwrap();
        assert_eq!(outcome.edited_response.as_deref(), Some("Fixed"));
    }

    #[test]
    fn test_validate_edited_text_only_with_edited_decision() {
        let err = validate_review(ReviewSubmission {
            edited_response: Some("text".into()),
            ..submission(ReviewDecision::Rejected, "r")
        })
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_validate_review_trims_and_drops_blank_comments() {
        let outcome = validate_review(ReviewSubmission {
            comments: Some("  ".into()),
            ..submission(ReviewDecision::Approved, " rev-1 ")
        })
        .unwrap();
        assert_eq!(outcome.reviewer_id, "rev-1");
        assert!(outcome.comments.is_none());
    }

    #[test]
    fn test_build_filter_limits() {
        assert_eq!(build_filter(None, None, None, None).unwrap().limit, 20);
        assert_eq!(build_filter(Some(100), None, None, None).unwrap().limit, 100);
        assert!(build_filter(Some(0), None, None, None).is_err());
        assert!(build_filter(Some(101), None, None, None).is_err());
    }

    #[test]
    fn test_build_filter_status() {
        let filter = build_filter(None, Some("approved"), None, Some(true)).unwrap();
        assert_eq!(filter.status, Some(ReviewStatus::Approved));
        assert_eq!(filter.policy_flag, Some(true));
        assert!(matches!(
            build_filter(None, Some("edited"), None, None),
            Err(AppError::Validation(_))
        ));
    }

    // -----------------------------------------------------------------------
    // Review state machine
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_review_applies_and_logs_event() {
        let (svc, id) = seeded().await;
        let result = svc
            .review(id, submission(ReviewDecision::Rejected, "rev"), Some("c-1".into()))
            .await
            .unwrap();
        assert!(result.applied);
        assert_eq!(result.record.status, ReviewStatus::Rejected);

        let events = svc.events(id).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].action, "REVIEW_SUBMITTED");
        assert_eq!(events[1].actor.as_deref(), Some("rev"));
        assert_eq!(events[1].correlation_id.as_deref(), Some("c-1"));
        let details = events[1].details.as_ref().unwrap();
        assert_eq!(details["status"], "rejected");
    }

    #[tokio::test]
    async fn test_identical_repeat_review_is_noop() {
        let (svc, id) = seeded().await;
        svc.review(id, submission(ReviewDecision::Approved, "rev"), None)
            .await
            .unwrap();
        let again = svc
            .review(id, submission(ReviewDecision::Approved, "rev"), None)
            .await
            .unwrap();
        assert!(!again.applied);
        assert_eq!(again.record.status, ReviewStatus::Approved);
        assert_eq!(svc.events(id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_different_review_of_decided_record_conflicts() {
        let (svc, id) = seeded().await;
        svc.review(id, submission(ReviewDecision::Approved, "rev"), None)
            .await
            .unwrap();
        let err = svc
            .review(id, submission(ReviewDecision::Rejected, "rev"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(svc.get(id).await.unwrap().status, ReviewStatus::Approved);
    }

    #[tokio::test]
    async fn test_edited_review_approves_with_correction() {
        let (svc, id) = seeded().await;
        let result = svc
            .review(
                id,
                ReviewSubmission {
                    edited_response: Some("NLP helps computers understand language.".into()),
                    comments: Some("clarified".into()),
                    ..submission(ReviewDecision::Edited, "editor")
                },
                None,
            )
            .await
            .unwrap();
        assert_eq!(result.record.status, ReviewStatus::Approved);
        assert_eq!(result.record.response, "NLP is a branch of AI.");
        assert_eq!(
            result.record.final_response(),
            "NLP helps computers understand language."
        );
        assert_eq!(result.record.review_comments.as_deref(), Some("clarified"));
    }

    #[tokio::test]
    async fn test_review_unknown_record() {
        let (svc, _) = seeded().await;
        let err = svc
            .review(Uuid::new_v4(), submission(ReviewDecision::Approved, "r"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_invalid_review_leaves_record_pending() {
        let (svc, id) = seeded().await;
        let _ = svc
            .review(id, submission(ReviewDecision::Edited, "r"), None)
            .await
            .unwrap_err();
        assert_eq!(svc.get(id).await.unwrap().status, ReviewStatus::Pending);
    }

    // -----------------------------------------------------------------------
    // UI metadata
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_pin_unpin_events() {
        let (svc, id) = seeded().await;
        svc.set_pinned(id, true, None).await.unwrap();
        assert!(svc.get(id).await.unwrap().pinned);
        svc.set_pinned(id, false, None).await.unwrap();
        let actions: Vec<String> = svc
            .events(id)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.action)
            .collect();
        assert_eq!(
            actions,
            vec!["RECORD_CREATED", "RECORD_PINNED", "RECORD_UNPINNED"]
        );
    }

    #[tokio::test]
    async fn test_rename_validation() {
        let (svc, id) = seeded().await;
        assert!(matches!(
            svc.rename(id, "  ", None).await,
            Err(AppError::Validation(_))
        ));
        let long = "x".repeat(MAX_TITLE_CHARS + 1);
        assert!(matches!(
            svc.rename(id, &long, None).await,
            Err(AppError::Validation(_))
        ));
        let exact = "é".repeat(MAX_TITLE_CHARS);
        assert_eq!(svc.rename(id, &exact, None).await.unwrap(), exact);
        assert_eq!(svc.rename(id, "  NLP chat ", None).await.unwrap(), "NLP chat");
        assert_eq!(
            svc.get(id).await.unwrap().custom_title.as_deref(),
            Some("NLP chat")
        );
    }

    #[tokio::test]
    async fn test_mutations_on_missing_record() {
        let (svc, _) = seeded().await;
        let missing = Uuid::new_v4();
        assert!(matches!(
            svc.set_pinned(missing, true, None).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            svc.rename(missing, "t", None).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            svc.delete(missing, None).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(svc.events(missing).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_events_survive_delete() {
        let (svc, id) = seeded().await;
        svc.delete(id, Some("c-9".into())).await.unwrap();
        assert!(matches!(svc.get(id).await, Err(AppError::NotFound(_))));
        let events = svc.events(id).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].action, "RECORD_DELETED");
        assert_eq!(events[1].correlation_id.as_deref(), Some("c-9"));
    }

    // -----------------------------------------------------------------------
    // Trail write failures
    // -----------------------------------------------------------------------

    /// Store whose next trail write collides with an existing event id, so the
    /// store rejects the event and must leave the record as it was.
    struct CollidingTrailStore {
        inner: MemoryAuditStore,
        collide_next: std::sync::atomic::AtomicBool,
    }

    impl CollidingTrailStore {
        async fn event<'a>(
            &self,
            record_id: Uuid,
            event: &'a AuditEventRecord,
        ) -> std::borrow::Cow<'a, AuditEventRecord> {
            use std::sync::atomic::Ordering;
            if !self.collide_next.swap(false, Ordering::SeqCst) {
                return std::borrow::Cow::Borrowed(event);
            }
            let existing = self.inner.events_for(record_id).await.unwrap();
            let mut colliding = event.clone();
            colliding.id = existing[0].id;
            std::borrow::Cow::Owned(colliding)
        }
    }

    #[async_trait::async_trait]
    impl AuditStore for CollidingTrailStore {
        async fn insert(&self, record: &AuditRecord, event: &AuditEventRecord) -> Result<()> {
            self.inner.insert(record, event).await
        }
        async fn get(&self, id: Uuid) -> Result<Option<AuditRecord>> {
            self.inner.get(id).await
        }
        async fn list(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>> {
            self.inner.list(filter).await
        }
        async fn apply_review(
            &self,
            id: Uuid,
            outcome: &ReviewOutcome,
            event: &AuditEventRecord,
        ) -> Result<ReviewTransition> {
            let event = self.event(id, event).await;
            self.inner.apply_review(id, outcome, &event).await
        }
        async fn set_pinned(&self, id: Uuid, pinned: bool, event: &AuditEventRecord) -> Result<bool> {
            let event = self.event(id, event).await;
            self.inner.set_pinned(id, pinned, &event).await
        }
        async fn set_title(&self, id: Uuid, title: &str, event: &AuditEventRecord) -> Result<bool> {
            let event = self.event(id, event).await;
            self.inner.set_title(id, title, &event).await
        }
        async fn delete(&self, id: Uuid, event: &AuditEventRecord) -> Result<bool> {
            let event = self.event(id, event).await;
            self.inner.delete(id, &event).await
        }
        async fn recent_statuses(&self, limit: i64) -> Result<Vec<crate::storage::StatusSample>> {
            self.inner.recent_statuses(limit).await
        }
        async fn events_for(&self, record_id: Uuid) -> Result<Vec<AuditEventRecord>> {
            self.inner.events_for(record_id).await
        }
        fn backend_name(&self) -> &'static str {
            "colliding"
        }
    }

    async fn seeded_with_failing_trail() -> (AuditService, Arc<CollidingTrailStore>, Uuid) {
        let store = Arc::new(CollidingTrailStore {
            inner: MemoryAuditStore::new(),
            collide_next: std::sync::atomic::AtomicBool::new(false),
        });
        let record = AuditRecord::pending(NewAuditRecord {
            user_id: None,
            prompt: "What is NLP?".into(),
            response: "NLP is a branch of AI.".into(),
            sources: vec![],
            confidence_score: 0.6,
            policy_violations: vec![],
            language: "en".into(),
        });
        let created = AuditEvent::new(AuditAction::RecordCreated, record.id).into_record();
        store.insert(&record, &created).await.unwrap();
        (AuditService::new(store.clone()), store, record.id)
    }

    #[tokio::test]
    async fn test_review_retry_after_failed_trail_write_logs_once() {
        use std::sync::atomic::Ordering;
        let (svc, store, id) = seeded_with_failing_trail().await;

        store.collide_next.store(true, Ordering::SeqCst);
        assert!(svc
            .review(id, submission(ReviewDecision::Approved, "rev"), None)
            .await
            .is_err());
        // The decision was not taken, so the reviewer can retry
        assert_eq!(svc.get(id).await.unwrap().status, ReviewStatus::Pending);

        let retry = svc
            .review(id, submission(ReviewDecision::Approved, "rev"), None)
            .await
            .unwrap();
        assert!(retry.applied);
        let submitted = svc
            .events(id)
            .await
            .unwrap()
            .into_iter()
            .filter(|e| e.action == "REVIEW_SUBMITTED")
            .count();
        assert_eq!(submitted, 1);
    }

    #[tokio::test]
    async fn test_failed_trail_write_keeps_record_metadata() {
        use std::sync::atomic::Ordering;
        let (svc, store, id) = seeded_with_failing_trail().await;

        store.collide_next.store(true, Ordering::SeqCst);
        assert!(svc.set_pinned(id, true, None).await.is_err());
        store.collide_next.store(true, Ordering::SeqCst);
        assert!(svc.rename(id, "title", None).await.is_err());
        store.collide_next.store(true, Ordering::SeqCst);
        assert!(svc.delete(id, None).await.is_err());

        let record = svc.get(id).await.unwrap();
        assert!(!record.pinned);
        assert!(record.custom_title.is_none());
        assert_eq!(svc.events(id).await.unwrap().len(), 1);
    }
}
