//! API module - HTTP handlers and middleware.

pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod routes;

use crate::config::Config;
use crate::services::policy_service::PolicyEngine;
use crate::services::rag_service::RagService;
use crate::storage::AuditStore;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Application state shared across handlers
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn AuditStore>,
    pub rag: Arc<RagService>,
    pub policy: Arc<PolicyEngine>,
    pub metrics_handle: Option<Arc<PrometheusHandle>>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn AuditStore>,
        rag: Arc<RagService>,
        policy: Arc<PolicyEngine>,
    ) -> Self {
        Self {
            config,
            store,
            rag,
            policy,
            metrics_handle: None,
        }
    }

    /// Set the Prometheus metrics handle for rendering /metrics.
    pub fn set_metrics_handle(&mut self, handle: PrometheusHandle) {
        self.metrics_handle = Some(Arc::new(handle));
    }
}

pub type SharedState = Arc<AppState>;
