//! Audit record model and the review state machine.
//!
//! A record is created `pending` by the prompt pipeline and moves at most once
//! to `approved` or `rejected`, driven by a single review.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle status of an audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ReviewStatus::Pending),
            "approved" => Some(ReviewStatus::Approved),
            "rejected" => Some(ReviewStatus::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReviewStatus::Pending)
    }
}

impl std::fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decision submitted by a human reviewer.
///
/// `Edited` approves the record with a reviewer-corrected answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Approved,
    Rejected,
    Edited,
}

impl ReviewDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewDecision::Approved => "approved",
            ReviewDecision::Rejected => "rejected",
            ReviewDecision::Edited => "edited",
        }
    }

    /// Terminal status a pending record moves to under this decision.
    pub fn resulting_status(&self) -> ReviewStatus {
        match self {
            ReviewDecision::Approved | ReviewDecision::Edited => ReviewStatus::Approved,
            ReviewDecision::Rejected => ReviewStatus::Rejected,
        }
    }
}

/// A retrieved passage cited as grounding for an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SourceCitation {
    /// Text of the retrieved chunk
    pub content: String,
    /// Document metadata (source, page, topic, ...)
    #[schema(value_type = Object)]
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// Similarity in (0, 1], derived from the vector store distance
    pub similarity_score: f64,
}

/// Persisted trace of one prompt/response interaction and its review outcome.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct AuditRecord {
    pub id: Uuid,
    pub user_id: Option<String>,
    pub prompt: String,
    pub response: String,
    pub sources: Vec<SourceCitation>,
    pub confidence_score: f64,
    pub policy_flag: bool,
    pub policy_violations: Vec<String>,
    pub status: ReviewStatus,
    pub reviewer_id: Option<String>,
    pub review_comments: Option<String>,
    /// Reviewer-corrected answer; `response` keeps the generated text.
    pub edited_response: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub pinned: bool,
    pub custom_title: Option<String>,
    pub language: String,
}

/// Inputs for a new pending record, produced by the prompt pipeline.
#[derive(Debug, Clone)]
pub struct NewAuditRecord {
    pub user_id: Option<String>,
    pub prompt: String,
    pub response: String,
    pub sources: Vec<SourceCitation>,
    pub confidence_score: f64,
    pub policy_violations: Vec<String>,
    pub language: String,
}

impl AuditRecord {
    /// Build a fresh pending record. The policy flag is derived from the violations.
    pub fn pending(new: NewAuditRecord) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            prompt: new.prompt,
            response: new.response,
            sources: new.sources,
            confidence_score: new.confidence_score,
            policy_flag: !new.policy_violations.is_empty(),
            policy_violations: new.policy_violations,
            status: ReviewStatus::Pending,
            reviewer_id: None,
            review_comments: None,
            edited_response: None,
            reviewed_at: None,
            created_at: Utc::now(),
            pinned: false,
            custom_title: None,
            language: new.language,
        }
    }

    /// The answer a reader should see: the reviewer's edit if any.
    pub fn final_response(&self) -> &str {
        self.edited_response.as_deref().unwrap_or(&self.response)
    }

    /// Apply a review to a pending record.
    ///
    /// Returns the current status as the error when the record is already terminal;
    /// the record is left untouched in that case.
    pub fn apply_review(&mut self, outcome: &ReviewOutcome) -> Result<(), ReviewStatus> {
        if self.status.is_terminal() {
            return Err(self.status);
        }
        self.status = outcome.decision.resulting_status();
        self.reviewer_id = Some(outcome.reviewer_id.clone());
        self.review_comments = outcome.comments.clone();
        self.edited_response = outcome.edited_response.clone();
        self.reviewed_at = Some(outcome.reviewed_at);
        Ok(())
    }
}

/// A validated review ready to be applied by a store.
#[derive(Debug, Clone)]
pub struct ReviewOutcome {
    pub decision: ReviewDecision,
    pub reviewer_id: String,
    pub comments: Option<String>,
    pub edited_response: Option<String>,
    pub reviewed_at: DateTime<Utc>,
}

impl ReviewOutcome {
    /// Whether `record` already carries exactly this review (a retried submission).
    pub fn is_reflected_in(&self, record: &AuditRecord) -> bool {
        record.status == self.decision.resulting_status()
            && record.reviewer_id.as_deref() == Some(self.reviewer_id.as_str())
            && record.edited_response == self.edited_response
    }
}

/// Result of attempting the pending → terminal transition in a store.
#[derive(Debug, Clone)]
pub enum ReviewTransition {
    /// The review was applied; carries the updated record.
    Applied(AuditRecord),
    /// The record was already terminal; carries it unchanged.
    AlreadyReviewed(AuditRecord),
    /// No record with that id.
    NotFound,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_record() -> AuditRecord {
        AuditRecord::pending(NewAuditRecord {
            user_id: Some("user-1".into()),
            prompt: "What is RAG?".into(),
            response: "RAG combines retrieval with generation.".into(),
            sources: vec![],
            confidence_score: 0.5,
            policy_violations: vec![],
            language: "en".into(),
        })
    }

    fn outcome(decision: ReviewDecision, reviewer: &str) -> ReviewOutcome {
        ReviewOutcome {
            decision,
            reviewer_id: reviewer.into(),
            comments: Some("looks fine".into()),
            edited_response: None,
            reviewed_at: Utc::now(),
        }
    }

    // -----------------------------------------------------------------------
    // ReviewStatus
    // -----------------------------------------------------------------------

    #[test]
    fn test_review_status_round_trip_strings() {
        for status in [ReviewStatus::Pending, ReviewStatus::Approved, ReviewStatus::Rejected] {
            assert_eq!(ReviewStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ReviewStatus::parse("APPROVED"), None);
        assert_eq!(ReviewStatus::parse("edited"), None);
    }

    #[test]
    fn test_review_status_terminal() {
        assert!(!ReviewStatus::Pending.is_terminal());
        assert!(ReviewStatus::Approved.is_terminal());
        assert!(ReviewStatus::Rejected.is_terminal());
    }

    #[test]
    fn test_review_status_serializes_lowercase() {
        let json = serde_json::to_value(ReviewStatus::Approved).unwrap();
        assert_eq!(json, "approved");
    }

    #[test]
    fn test_decision_resulting_status() {
        assert_eq!(ReviewDecision::Approved.resulting_status(), ReviewStatus::Approved);
        assert_eq!(ReviewDecision::Edited.resulting_status(), ReviewStatus::Approved);
        assert_eq!(ReviewDecision::Rejected.resulting_status(), ReviewStatus::Rejected);
    }

    #[test]
    fn test_decision_deserialize_rejects_unknown() {
        assert!(serde_json::from_str::<ReviewDecision>("\"maybe\"").is_err());
        let d: ReviewDecision = serde_json::from_str("\"edited\"").unwrap();
        assert_eq!(d, ReviewDecision::Edited);
    }

    // -----------------------------------------------------------------------
    // AuditRecord
    // -----------------------------------------------------------------------

    #[test]
    fn test_pending_record_defaults() {
        let record = new_record();
        assert_eq!(record.status, ReviewStatus::Pending);
        assert!(!record.policy_flag);
        assert!(record.reviewer_id.is_none());
        assert!(record.reviewed_at.is_none());
        assert!(!record.pinned);
        assert!(!record.id.is_nil());
    }

    #[test]
    fn test_policy_flag_follows_violations() {
        let record = AuditRecord::pending(NewAuditRecord {
            user_id: None,
            prompt: "p".into(),
            response: "r".into(),
            sources: vec![],
            confidence_score: 0.0,
            policy_violations: vec!["prompt:pii_email".into()],
            language: "id".into(),
        });
        assert!(record.policy_flag);
    }

    #[test]
    fn test_apply_review_sets_all_review_fields() {
        let mut record = new_record();
        let review = outcome(ReviewDecision::Approved, "reviewer-7");
        record.apply_review(&review).unwrap();
        assert_eq!(record.status, ReviewStatus::Approved);
        assert_eq!(record.reviewer_id.as_deref(), Some("reviewer-7"));
        assert_eq!(record.review_comments.as_deref(), Some("looks fine"));
        assert_eq!(record.reviewed_at, Some(review.reviewed_at));
    }

    #[test]
    fn test_apply_review_twice_is_refused() {
        let mut record = new_record();
        record
            .apply_review(&outcome(ReviewDecision::Rejected, "a"))
            .unwrap();
        let snapshot = record.clone();
        let err = record
            .apply_review(&outcome(ReviewDecision::Approved, "b"))
            .unwrap_err();
        assert_eq!(err, ReviewStatus::Rejected);
        assert_eq!(record, snapshot);
    }

    #[test]
    fn test_edited_review_keeps_original_response() {
        let mut record = new_record();
        let review = ReviewOutcome {
            edited_response: Some("Corrected answer.".into()),
            ..outcome(ReviewDecision::Edited, "editor")
        };
        record.apply_review(&review).unwrap();
        assert_eq!(record.status, ReviewStatus::Approved);
        assert_eq!(record.response, "RAG combines retrieval with generation.");
        assert_eq!(record.final_response(), "Corrected answer.");
    }

    #[test]
    fn test_is_reflected_in_matches_only_same_review() {
        let mut record = new_record();
        let review = outcome(ReviewDecision::Approved, "r1");
        record.apply_review(&review).unwrap();

        assert!(review.is_reflected_in(&record));
        assert!(!outcome(ReviewDecision::Approved, "r2").is_reflected_in(&record));
        assert!(!outcome(ReviewDecision::Rejected, "r1").is_reflected_in(&record));
        let edited = ReviewOutcome {
            edited_response: Some("x".into()),
            ..outcome(ReviewDecision::Edited, "r1")
        };
        assert!(!edited.is_reflected_in(&record));
    }
}
