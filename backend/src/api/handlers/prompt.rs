//! Prompt submission handler.

use axum::{
    extract::{Extension, State},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use utoipa::{OpenApi, ToSchema};

use crate::api::middleware::tracing::CorrelationId;
use crate::api::SharedState;
use crate::error::Result;
use crate::services::prompt_service::{PromptResult, PromptService, PromptSubmission};

pub fn router() -> Router<SharedState> {
    Router::new().route("/prompt", post(submit_prompt))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PromptRequest {
    /// User question
    pub prompt: String,
    /// Optional user identifier for audit tracking
    pub user_id: Option<String>,
    /// Answer language: "id" (default) or "en"
    pub language: Option<String>,
}

/// Submit a prompt to the RAG pipeline.
///
/// The answer is recorded as a pending audit log awaiting human review.
#[utoipa::path(
    post,
    path = "/prompt",
    tag = "prompt",
    request_body = PromptRequest,
    responses(
        (status = 200, description = "Generated answer with governance metadata", body = PromptResult),
        (status = 400, description = "Invalid prompt or language", body = crate::api::openapi::ErrorResponse),
        (status = 502, description = "LLM or vector store failure", body = crate::api::openapi::ErrorResponse),
    )
)]
pub async fn submit_prompt(
    State(state): State<SharedState>,
    correlation: Option<Extension<CorrelationId>>,
    Json(payload): Json<PromptRequest>,
) -> Result<Json<PromptResult>> {
    let service = PromptService::new(state.store.clone(), state.rag.clone(), state.policy.clone());
    let result = service
        .submit(
            PromptSubmission {
                prompt: payload.prompt,
                user_id: payload.user_id,
                language: payload.language,
            },
            correlation.map(|Extension(c)| c.into_inner()),
        )
        .await?;
    Ok(Json(result))
}

#[derive(OpenApi)]
#[openapi(
    paths(submit_prompt),
    components(schemas(
        PromptRequest,
        PromptResult,
        crate::models::audit_record::SourceCitation,
        crate::models::audit_record::ReviewStatus,
    ))
)]
pub struct PromptApiDoc;
