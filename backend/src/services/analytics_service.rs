//! Review statistics over recent audit records.

use std::sync::Arc;

use serde::Serialize;
use utoipa::ToSchema;

use crate::error::Result;
use crate::models::audit_record::ReviewStatus;
use crate::storage::{AuditStore, StatusSample};

/// Number of most recent records the statistics are computed over.
pub const STATS_WINDOW: i64 = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct AnalyticsStats {
    pub total_conversations: u64,
    pub total_suggestions: u64,
    /// Share of reviewed records that were approved, in percent
    pub ai_acceptance_rate: f64,
    pub approved_count: u64,
    pub rejected_count: u64,
    pub pending_count: u64,
    pub flagged_count: u64,
}

impl AnalyticsStats {
    pub fn from_samples(samples: &[StatusSample]) -> Self {
        let count = |status: ReviewStatus| samples.iter().filter(|s| s.status == status).count() as u64;
        let approved = count(ReviewStatus::Approved);
        let rejected = count(ReviewStatus::Rejected);
        let reviewed = approved + rejected;

        let acceptance = if reviewed == 0 {
            100.0
        } else {
            approved as f64 / reviewed as f64 * 100.0
        };

        let total = samples.len() as u64;
        Self {
            total_conversations: total,
            total_suggestions: total,
            ai_acceptance_rate: (acceptance * 10.0).round() / 10.0,
            approved_count: approved,
            rejected_count: rejected,
            pending_count: count(ReviewStatus::Pending),
            flagged_count: samples.iter().filter(|s| s.policy_flag).count() as u64,
        }
    }
}

pub struct AnalyticsService {
    store: Arc<dyn AuditStore>,
}

impl AnalyticsService {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    pub async fn stats(&self) -> Result<AnalyticsStats> {
        let samples = self.store.recent_statuses(STATS_WINDOW).await?;
        Ok(AnalyticsStats::from_samples(&samples))
    }
}
