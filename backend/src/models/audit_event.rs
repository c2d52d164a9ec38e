//! Governance event trail for audit records.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// Actions recorded against an audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    RecordCreated,
    ReviewSubmitted,
    RecordPinned,
    RecordUnpinned,
    RecordRenamed,
    RecordDeleted,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::RecordCreated => "RECORD_CREATED",
            AuditAction::ReviewSubmitted => "REVIEW_SUBMITTED",
            AuditAction::RecordPinned => "RECORD_PINNED",
            AuditAction::RecordUnpinned => "RECORD_UNPINNED",
            AuditAction::RecordRenamed => "RECORD_RENAMED",
            AuditAction::RecordDeleted => "RECORD_DELETED",
        }
    }
}

/// Audit event builder
pub struct AuditEvent {
    record_id: Uuid,
    action: AuditAction,
    actor: Option<String>,
    details: Option<serde_json::Value>,
    correlation_id: Option<String>,
}

impl AuditEvent {
    pub fn new(action: AuditAction, record_id: Uuid) -> Self {
        Self {
            record_id,
            action,
            actor: None,
            details: None,
            correlation_id: None,
        }
    }

    pub fn actor(mut self, actor: Option<String>) -> Self {
        self.actor = actor;
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn correlation(mut self, correlation_id: Option<String>) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    /// Stamp the event with an id and timestamp.
    pub fn into_record(self) -> AuditEventRecord {
        AuditEventRecord {
            id: Uuid::new_v4(),
            record_id: self.record_id,
            action: self.action.as_str().to_string(),
            actor: self.actor,
            details: self.details,
            correlation_id: self.correlation_id,
            created_at: Utc::now(),
        }
    }
}

/// Stored audit event.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow, ToSchema)]
pub struct AuditEventRecord {
    pub id: Uuid,
    pub record_id: Uuid,
    pub action: String,
    pub actor: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
    pub correlation_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_action_as_str() {
        assert_eq!(AuditAction::RecordCreated.as_str(), "RECORD_CREATED");
        assert_eq!(AuditAction::ReviewSubmitted.as_str(), "REVIEW_SUBMITTED");
        assert_eq!(AuditAction::RecordPinned.as_str(), "RECORD_PINNED");
        assert_eq!(AuditAction::RecordUnpinned.as_str(), "RECORD_UNPINNED");
        assert_eq!(AuditAction::RecordRenamed.as_str(), "RECORD_RENAMED");
        assert_eq!(AuditAction::RecordDeleted.as_str(), "RECORD_DELETED");
    }

    #[test]
    fn test_builder_defaults() {
        let record_id = Uuid::new_v4();
        let event = AuditEvent::new(AuditAction::RecordCreated, record_id).into_record();
        assert_eq!(event.record_id, record_id);
        assert_eq!(event.action, "RECORD_CREATED");
        assert!(event.actor.is_none());
        assert!(event.details.is_none());
        assert!(event.correlation_id.is_none());
    }

    #[test]
    fn test_builder_full_chain() {
        let details = serde_json::json!({"decision": "approved"});
        let event = AuditEvent::new(AuditAction::ReviewSubmitted, Uuid::new_v4())
            .actor(Some("reviewer-1".into()))
            .details(details.clone())
            .correlation(Some("corr-123".into()))
            .into_record();
        assert_eq!(event.actor.as_deref(), Some("reviewer-1"));
        assert_eq!(event.details, Some(details));
        assert_eq!(event.correlation_id.as_deref(), Some("corr-123"));
    }
}
