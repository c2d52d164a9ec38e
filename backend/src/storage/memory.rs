//! In-process audit store for development and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{AuditFilter, AuditStore, StatusSample};
use crate::error::{AppError, Result};
use crate::models::audit_event::AuditEventRecord;
use crate::models::audit_record::{AuditRecord, ReviewOutcome, ReviewTransition};

/// Audit store backed by process memory. Contents are lost on restart.
///
/// Records and events share one lock so a mutation and its event are
/// published together.
#[derive(Default)]
pub struct MemoryAuditStore {
    state: RwLock<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    records: HashMap<Uuid, AuditRecord>,
    events: Vec<AuditEventRecord>,
}

impl MemoryState {
    /// Rejects an event id that is already in the trail. Called before any
    /// record change so a failed append leaves the record untouched.
    fn check_event(&self, event: &AuditEventRecord) -> Result<()> {
        if self.events.iter().any(|e| e.id == event.id) {
            return Err(AppError::Conflict(format!(
                "Audit event {} already exists",
                event.id
            )));
        }
        Ok(())
    }
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(records: &mut [AuditRecord]) {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn insert(&self, record: &AuditRecord, event: &AuditEventRecord) -> Result<()> {
        let mut state = self.state.write().await;
        if state.records.contains_key(&record.id) {
            return Err(AppError::Conflict(format!(
                "Audit log {} already exists",
                record.id
            )));
        }
        state.check_event(event)?;
        state.records.insert(record.id, record.clone());
        state.events.push(event.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<AuditRecord>> {
        Ok(self.state.read().await.records.get(&id).cloned())
    }

    async fn list(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>> {
        let state = self.state.read().await;
        let mut matching: Vec<AuditRecord> = state
            .records
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        newest_first(&mut matching);
        // Stable sort keeps newest-first order within each pinned group.
        matching.sort_by(|a, b| b.pinned.cmp(&a.pinned));
        matching.truncate(filter.limit.max(0) as usize);
        Ok(matching)
    }

    async fn apply_review(
        &self,
        id: Uuid,
        outcome: &ReviewOutcome,
        event: &AuditEventRecord,
    ) -> Result<ReviewTransition> {
        let mut state = self.state.write().await;
        let Some(current) = state.records.get(&id) else {
            return Ok(ReviewTransition::NotFound);
        };
        if current.status.is_terminal() {
            return Ok(ReviewTransition::AlreadyReviewed(current.clone()));
        }
        state.check_event(event)?;

        let Some(record) = state.records.get_mut(&id) else {
            return Ok(ReviewTransition::NotFound);
        };
        if record.apply_review(outcome).is_err() {
            return Ok(ReviewTransition::AlreadyReviewed(record.clone()));
        }
        let updated = record.clone();
        state.events.push(event.clone());
        Ok(ReviewTransition::Applied(updated))
    }

    async fn set_pinned(&self, id: Uuid, pinned: bool, event: &AuditEventRecord) -> Result<bool> {
        let mut state = self.state.write().await;
        if !state.records.contains_key(&id) {
            return Ok(false);
        }
        state.check_event(event)?;
        if let Some(record) = state.records.get_mut(&id) {
            record.pinned = pinned;
        }
        state.events.push(event.clone());
        Ok(true)
    }

    async fn set_title(&self, id: Uuid, title: &str, event: &AuditEventRecord) -> Result<bool> {
        let mut state = self.state.write().await;
        if !state.records.contains_key(&id) {
            return Ok(false);
        }
        state.check_event(event)?;
        if let Some(record) = state.records.get_mut(&id) {
            record.custom_title = Some(title.to_string());
        }
        state.events.push(event.clone());
        Ok(true)
    }

    async fn delete(&self, id: Uuid, event: &AuditEventRecord) -> Result<bool> {
        let mut state = self.state.write().await;
        if !state.records.contains_key(&id) {
            return Ok(false);
        }
        state.check_event(event)?;
        state.records.remove(&id);
        state.events.push(event.clone());
        Ok(true)
    }

    async fn recent_statuses(&self, limit: i64) -> Result<Vec<StatusSample>> {
        let state = self.state.read().await;
        let mut all: Vec<AuditRecord> = state.records.values().cloned().collect();
        newest_first(&mut all);
        Ok(all
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|r| StatusSample {
                status: r.status,
                policy_flag: r.policy_flag,
            })
            .collect())
    }

    async fn events_for(&self, record_id: Uuid) -> Result<Vec<AuditEventRecord>> {
        let state = self.state.read().await;
        Ok(state
            .events
            .iter()
            .filter(|e| e.record_id == record_id)
            .cloned()
            .collect())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
