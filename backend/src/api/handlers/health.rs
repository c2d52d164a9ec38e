//! Service info, health and metrics endpoints.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

use crate::api::SharedState;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(service_info))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/livez", get(liveness_check))
        .route("/metrics", get(metrics))
}

#[derive(Serialize, ToSchema)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    pub status: String,
    pub features: Vec<String>,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub checks: HealthChecks,
}

#[derive(Serialize, ToSchema)]
pub struct HealthChecks {
    pub audit_store: CheckStatus,
    pub vector_store: CheckStatus,
    pub policy_engine: CheckStatus,
}

#[derive(Serialize, ToSchema)]
pub struct CheckStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CheckStatus {
    fn healthy(message: Option<String>) -> Self {
        Self {
            status: "healthy".to_string(),
            message,
        }
    }

    fn from_result<E: std::fmt::Display>(result: std::result::Result<(), E>) -> Self {
        match result {
            Ok(()) => Self::healthy(None),
            Err(e) => Self {
                status: "unhealthy".to_string(),
                message: Some(e.to_string()),
            },
        }
    }

    fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// API information
#[utoipa::path(
    get,
    path = "/",
    tag = "health",
    responses((status = 200, description = "Service information", body = ServiceInfo))
)]
pub async fn service_info(State(state): State<SharedState>) -> Json<ServiceInfo> {
    Json(ServiceInfo {
        name: state.config.app_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "running".to_string(),
        features: [
            "RAG Pipeline",
            "Policy Enforcement",
            "Human-in-the-Loop Review",
            "Audit Logging",
        ]
        .iter()
        .map(|f| f.to_string())
        .collect(),
    })
}

/// Health check with per-dependency status
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "All dependencies healthy", body = HealthResponse),
        (status = 503, description = "A dependency is unhealthy", body = HealthResponse),
    )
)]
pub async fn health_check(State(state): State<SharedState>) -> impl IntoResponse {
    let mut audit_store = CheckStatus::from_result(state.store.ping().await);
    if audit_store.is_healthy() {
        audit_store.message = Some(state.store.backend_name().to_string());
    }
    let vector_store = CheckStatus::from_result(state.rag.retriever_ready().await);
    let policy_engine = if state.policy.is_enabled() {
        CheckStatus::healthy(Some(format!("{} rules", state.policy.rule_count())))
    } else {
        CheckStatus::healthy(Some("disabled".to_string()))
    };

    let healthy = audit_store.is_healthy() && vector_store.is_healthy();
    let response = HealthResponse {
        status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks {
            audit_store,
            vector_store,
            policy_engine,
        },
    };

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(response))
}

/// Readiness check: can the audit store be reached?
#[utoipa::path(
    get,
    path = "/ready",
    tag = "health",
    responses(
        (status = 200, description = "Ready"),
        (status = 503, description = "Audit store unreachable"),
    )
)]
pub async fn readiness_check(State(state): State<SharedState>) -> StatusCode {
    match state.store.ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Liveness check: the process is serving requests
#[utoipa::path(
    get,
    path = "/livez",
    tag = "health",
    responses((status = 200, description = "Alive"))
)]
pub async fn liveness_check() -> StatusCode {
    StatusCode::OK
}

/// Prometheus metrics in text exposition format
pub async fn metrics(State(state): State<SharedState>) -> impl IntoResponse {
    match &state.metrics_handle {
        Some(handle) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            handle.render(),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [("content-type", "text/plain; charset=utf-8")],
            "metrics recorder not installed".to_string(),
        ),
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(service_info, health_check, readiness_check, liveness_check),
    components(schemas(ServiceInfo, HealthResponse, HealthChecks, CheckStatus))
)]
pub struct HealthApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_status_skip_none_message() {
        let json = serde_json::to_string(&CheckStatus::healthy(None)).unwrap();
        assert!(!json.contains("message"));
    }

    #[test]
    fn test_check_status_from_error() {
        let status = CheckStatus::from_result(Err::<(), _>("connection refused"));
        assert!(!status.is_healthy());
        assert_eq!(status.message.as_deref(), Some("connection refused"));
    }

    #[test]
    fn test_unhealthy_response_serialization() {
        let response = HealthResponse {
            status: "unhealthy".to_string(),
            version: "1.0.0".to_string(),
            checks: HealthChecks {
                audit_store: CheckStatus::from_result(Err::<(), _>("timeout")),
                vector_store: CheckStatus::healthy(None),
                policy_engine: CheckStatus::healthy(Some("8 rules".into())),
            },
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"status\":\"unhealthy\""));
        assert!(json.contains("\"audit_store\""));
        assert!(json.contains("8 rules"));
    }
}
