//! Audit store backends.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::audit_event::AuditEventRecord;
use crate::models::audit_record::{AuditRecord, ReviewOutcome, ReviewStatus, ReviewTransition};

/// Listing filter for audit records.
#[derive(Debug, Clone)]
pub struct AuditFilter {
    pub limit: i64,
    pub status: Option<ReviewStatus>,
    pub user_id: Option<String>,
    pub policy_flag: Option<bool>,
}

impl Default for AuditFilter {
    fn default() -> Self {
        Self {
            limit: 20,
            status: None,
            user_id: None,
            policy_flag: None,
        }
    }
}

impl AuditFilter {
    /// Whether `record` passes the non-limit criteria.
    pub fn matches(&self, record: &AuditRecord) -> bool {
        self.status.map_or(true, |s| record.status == s)
            && self
                .user_id
                .as_deref()
                .map_or(true, |u| record.user_id.as_deref() == Some(u))
            && self.policy_flag.map_or(true, |f| record.policy_flag == f)
    }
}

/// Status and flag of a record, used for aggregate statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSample {
    pub status: ReviewStatus,
    pub policy_flag: bool,
}

/// Persistence for audit records and their event trail.
///
/// Every mutation takes the event that documents it. The record change and the
/// event are written as one unit: either both are stored or neither is, and
/// the event is written only when the mutation takes effect.
///
/// `apply_review` must be atomic: of several concurrent reviews of one pending
/// record, exactly one observes `Applied`.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Persist a newly created record together with its creation event
    async fn insert(&self, record: &AuditRecord, event: &AuditEventRecord) -> Result<()>;

    /// Fetch a record by id
    async fn get(&self, id: Uuid) -> Result<Option<AuditRecord>>;

    /// List records, pinned first then newest first
    async fn list(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>>;

    /// Move a pending record to its terminal status; `event` is written only
    /// on `Applied`
    async fn apply_review(
        &self,
        id: Uuid,
        outcome: &ReviewOutcome,
        event: &AuditEventRecord,
    ) -> Result<ReviewTransition>;

    /// Set the pinned flag; returns false when the record does not exist
    async fn set_pinned(&self, id: Uuid, pinned: bool, event: &AuditEventRecord) -> Result<bool>;

    /// Set the custom title; returns false when the record does not exist
    async fn set_title(&self, id: Uuid, title: &str, event: &AuditEventRecord) -> Result<bool>;

    /// Delete a record; returns false when the record does not exist.
    /// Earlier events of the record are kept.
    async fn delete(&self, id: Uuid, event: &AuditEventRecord) -> Result<bool>;

    /// Status samples of the most recent `limit` records
    async fn recent_statuses(&self, limit: i64) -> Result<Vec<StatusSample>>;

    /// Events for one record, oldest first
    async fn events_for(&self, record_id: Uuid) -> Result<Vec<AuditEventRecord>>;

    /// Connectivity check used by health endpoints
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    /// Backend name for health reporting
    fn backend_name(&self) -> &'static str;
}
