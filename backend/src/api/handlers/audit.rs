//! Audit log handlers: listing, lookup, UI metadata and the event trail.

use axum::{
    extract::{Extension, Path, Query, State},
    routing::{get, patch},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

use crate::api::middleware::tracing::CorrelationId;
use crate::api::SharedState;
use crate::error::Result;
use crate::models::audit_event::AuditEventRecord;
use crate::models::audit_record::AuditRecord;
use crate::services::audit_service::{build_filter, AuditService};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_audit_logs))
        .route("/:id", get(get_audit_log).delete(delete_audit_log))
        .route("/:id/pin", patch(pin_audit_log))
        .route("/:id/rename", patch(rename_audit_log))
        .route("/:id/events", get(list_audit_events))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListAuditQuery {
    /// Maximum records to return (1-100, default 20)
    pub limit: Option<i64>,
    /// Filter by status: pending, approved, rejected
    pub status: Option<String>,
    pub user_id: Option<String>,
    pub policy_flag: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PinRequest {
    pub pinned: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PinResponse {
    pub message: String,
    pub audit_id: Uuid,
    pub pinned: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RenameRequest {
    pub custom_title: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RenameResponse {
    pub message: String,
    pub audit_id: Uuid,
    pub custom_title: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteResponse {
    pub message: String,
    pub audit_id: Uuid,
}

fn correlation_id(correlation: Option<Extension<CorrelationId>>) -> Option<String> {
    correlation.map(|Extension(c)| c.into_inner())
}

/// List audit logs, pinned first then newest first
#[utoipa::path(
    get,
    path = "/audit",
    tag = "audit",
    params(ListAuditQuery),
    responses(
        (status = 200, description = "Audit logs", body = Vec<AuditRecord>),
        (status = 400, description = "Invalid query parameters", body = crate::api::openapi::ErrorResponse),
    )
)]
pub async fn list_audit_logs(
    State(state): State<SharedState>,
    Query(query): Query<ListAuditQuery>,
) -> Result<Json<Vec<AuditRecord>>> {
    let filter = build_filter(
        query.limit,
        query.status.as_deref(),
        query.user_id,
        query.policy_flag,
    )?;
    let records = AuditService::new(state.store.clone()).list(&filter).await?;
    Ok(Json(records))
}

/// Get a single audit log
#[utoipa::path(
    get,
    path = "/audit/{id}",
    tag = "audit",
    params(("id" = Uuid, Path, description = "Audit log ID")),
    responses(
        (status = 200, description = "Audit log", body = AuditRecord),
        (status = 404, description = "Audit log not found", body = crate::api::openapi::ErrorResponse),
    )
)]
pub async fn get_audit_log(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AuditRecord>> {
    let record = AuditService::new(state.store.clone()).get(id).await?;
    Ok(Json(record))
}

/// Pin or unpin an audit log
#[utoipa::path(
    patch,
    path = "/audit/{id}/pin",
    tag = "audit",
    params(("id" = Uuid, Path, description = "Audit log ID")),
    request_body = PinRequest,
    responses(
        (status = 200, description = "Pin status updated", body = PinResponse),
        (status = 404, description = "Audit log not found", body = crate::api::openapi::ErrorResponse),
    )
)]
pub async fn pin_audit_log(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    correlation: Option<Extension<CorrelationId>>,
    Json(payload): Json<PinRequest>,
) -> Result<Json<PinResponse>> {
    AuditService::new(state.store.clone())
        .set_pinned(id, payload.pinned, correlation_id(correlation))
        .await?;
    Ok(Json(PinResponse {
        message: "Pin status updated successfully".to_string(),
        audit_id: id,
        pinned: payload.pinned,
    }))
}

/// Set a custom display title
#[utoipa::path(
    patch,
    path = "/audit/{id}/rename",
    tag = "audit",
    params(("id" = Uuid, Path, description = "Audit log ID")),
    request_body = RenameRequest,
    responses(
        (status = 200, description = "Audit log renamed", body = RenameResponse),
        (status = 400, description = "Invalid title", body = crate::api::openapi::ErrorResponse),
        (status = 404, description = "Audit log not found", body = crate::api::openapi::ErrorResponse),
    )
)]
pub async fn rename_audit_log(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    correlation: Option<Extension<CorrelationId>>,
    Json(payload): Json<RenameRequest>,
) -> Result<Json<RenameResponse>> {
    let custom_title = AuditService::new(state.store.clone())
        .rename(id, &payload.custom_title, correlation_id(correlation))
        .await?;
    Ok(Json(RenameResponse {
        message: "Audit log renamed successfully".to_string(),
        audit_id: id,
        custom_title,
    }))
}

/// Delete an audit log. Its event trail is kept.
#[utoipa::path(
    delete,
    path = "/audit/{id}",
    tag = "audit",
    params(("id" = Uuid, Path, description = "Audit log ID")),
    responses(
        (status = 200, description = "Audit log deleted", body = DeleteResponse),
        (status = 404, description = "Audit log not found", body = crate::api::openapi::ErrorResponse),
    )
)]
pub async fn delete_audit_log(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    correlation: Option<Extension<CorrelationId>>,
) -> Result<Json<DeleteResponse>> {
    AuditService::new(state.store.clone())
        .delete(id, correlation_id(correlation))
        .await?;
    Ok(Json(DeleteResponse {
        message: "Audit log deleted successfully".to_string(),
        audit_id: id,
    }))
}

/// Governance event trail of an audit log, oldest first
#[utoipa::path(
    get,
    path = "/audit/{id}/events",
    tag = "audit",
    params(("id" = Uuid, Path, description = "Audit log ID")),
    responses(
        (status = 200, description = "Event trail", body = Vec<AuditEventRecord>),
        (status = 404, description = "No such audit log", body = crate::api::openapi::ErrorResponse),
    )
)]
pub async fn list_audit_events(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<AuditEventRecord>>> {
    let events = AuditService::new(state.store.clone()).events(id).await?;
    Ok(Json(events))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        list_audit_logs,
        get_audit_log,
        pin_audit_log,
        rename_audit_log,
        delete_audit_log,
        list_audit_events,
    ),
    components(schemas(
        AuditRecord,
        AuditEventRecord,
        PinRequest,
        PinResponse,
        RenameRequest,
        RenameResponse,
        DeleteResponse,
    ))
)]
pub struct AuditApiDoc;
