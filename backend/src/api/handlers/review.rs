//! Human-in-the-loop review handler.

use axum::{
    extract::{Extension, Path, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

use crate::api::middleware::tracing::CorrelationId;
use crate::api::SharedState;
use crate::error::Result;
use crate::models::audit_record::{AuditRecord, ReviewDecision};
use crate::services::audit_service::{AuditService, ReviewSubmission};

pub fn router() -> Router<SharedState> {
    Router::new().route("/review/:id", post(submit_review))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReviewRequest {
    pub decision: ReviewDecision,
    pub reviewer_id: String,
    pub comments: Option<String>,
    /// Corrected answer; required when decision is "edited"
    pub edited_response: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReviewResponse {
    pub message: String,
    pub audit_id: Uuid,
    pub decision: ReviewDecision,
    pub reviewer_id: String,
    pub audit_log: AuditRecord,
}

/// Approve, edit or reject a pending answer.
///
/// A record is decided once. Repeating the deciding review returns the
/// record unchanged; a different review of a decided record is a conflict.
#[utoipa::path(
    post,
    path = "/review/{id}",
    tag = "review",
    params(("id" = Uuid, Path, description = "Audit log ID")),
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "Review recorded", body = ReviewResponse),
        (status = 400, description = "Invalid review", body = crate::api::openapi::ErrorResponse),
        (status = 404, description = "Audit log not found", body = crate::api::openapi::ErrorResponse),
        (status = 409, description = "Audit log already reviewed", body = crate::api::openapi::ErrorResponse),
    )
)]
pub async fn submit_review(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    correlation: Option<Extension<CorrelationId>>,
    Json(payload): Json<ReviewRequest>,
) -> Result<Json<ReviewResponse>> {
    let decision = payload.decision;
    let result = AuditService::new(state.store.clone())
        .review(
            id,
            ReviewSubmission {
                decision,
                reviewer_id: payload.reviewer_id,
                comments: payload.comments,
                edited_response: payload.edited_response,
            },
            correlation.map(|Extension(c)| c.into_inner()),
        )
        .await?;

    let message = if result.applied {
        "Review submitted successfully"
    } else {
        "Review already recorded"
    };

    Ok(Json(ReviewResponse {
        message: message.to_string(),
        audit_id: id,
        decision,
        reviewer_id: result.record.reviewer_id.clone().unwrap_or_default(),
        audit_log: result.record,
    }))
}

#[derive(OpenApi)]
#[openapi(
    paths(submit_review),
    components(schemas(ReviewRequest, ReviewResponse, ReviewDecision))
)]
pub struct ReviewApiDoc;
