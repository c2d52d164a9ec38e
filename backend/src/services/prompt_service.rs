//! Prompt pipeline: answer, screen, and record every interaction for review.

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::audit_event::{AuditAction, AuditEvent};
use crate::models::audit_record::{AuditRecord, NewAuditRecord, ReviewStatus, SourceCitation};
use crate::services::metrics_service;
use crate::services::policy_service::PolicyEngine;
use crate::services::rag_service::{Language, RagService};
use crate::storage::AuditStore;

/// A prompt as submitted by a user.
#[derive(Debug, Clone)]
pub struct PromptSubmission {
    pub prompt: String,
    pub user_id: Option<String>,
    pub language: Option<String>,
}

/// Answer returned to the user together with its governance metadata.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PromptResult {
    pub audit_id: Uuid,
    pub answer: String,
    pub sources: Vec<SourceCitation>,
    pub confidence_score: f64,
    pub policy_flag: bool,
    pub policy_violations: Vec<String>,
    pub status: ReviewStatus,
}

impl From<&AuditRecord> for PromptResult {
    fn from(record: &AuditRecord) -> Self {
        Self {
            audit_id: record.id,
            answer: record.response.clone(),
            sources: record.sources.clone(),
            confidence_score: record.confidence_score,
            policy_flag: record.policy_flag,
            policy_violations: record.policy_violations.clone(),
            status: record.status,
        }
    }
}

pub struct PromptService {
    store: Arc<dyn AuditStore>,
    rag: Arc<RagService>,
    policy: Arc<PolicyEngine>,
}

impl PromptService {
    pub fn new(store: Arc<dyn AuditStore>, rag: Arc<RagService>, policy: Arc<PolicyEngine>) -> Self {
        Self { store, rag, policy }
    }

    /// Run the full pipeline and persist a pending audit record.
    pub async fn submit(
        &self,
        submission: PromptSubmission,
        correlation_id: Option<String>,
    ) -> Result<PromptResult> {
        if submission.prompt.trim().is_empty() {
            return Err(AppError::Validation("prompt must not be empty".into()));
        }
        let language = match submission.language.as_deref() {
            None => Language::default(),
            Some(code) => Language::parse(code).ok_or_else(|| {
                AppError::Validation(format!(
                    "unsupported language '{}'. Must be one of: id, en",
                    code
                ))
            })?,
        };

        tracing::info!(
            user_id = ?submission.user_id,
            prompt_length = submission.prompt.len(),
            language = language.as_str(),
            "Received prompt"
        );

        let rag = self.rag.generate(&submission.prompt, language).await?;
        let verdict = self
            .policy
            .check_prompt_and_response(&submission.prompt, &rag.answer);

        let record = AuditRecord::pending(NewAuditRecord {
            user_id: submission.user_id,
            prompt: submission.prompt,
            response: rag.answer,
            sources: rag.sources,
            confidence_score: rag.confidence_score,
            policy_violations: verdict.violations,
            language: language.as_str().to_string(),
        });
        let event = AuditEvent::new(AuditAction::RecordCreated, record.id)
            .actor(record.user_id.clone())
            .details(json!({
                "policy_flag": record.policy_flag,
                "confidence_score": record.confidence_score,
                "language": record.language,
            }))
            .correlation(correlation_id)
            .into_record();
        self.store.insert(&record, &event).await?;

        metrics_service::record_prompt(
            &record.language,
            record.policy_flag,
            record.confidence_score,
        );
        metrics_service::record_policy_violations(&record.policy_violations);

        tracing::info!(
            audit_id = %record.id,
            confidence_score = record.confidence_score,
            policy_flag = record.policy_flag,
            violations = record.policy_violations.len(),
            "Prompt processed"
        );

        Ok(PromptResult::from(&record))
    }
}
