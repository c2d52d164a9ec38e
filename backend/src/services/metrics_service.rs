//! Prometheus metrics collection and HTTP request instrumentation.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

use axum::{
    body::Body,
    extract::MatchedPath,
    http::{Request, Response},
    middleware::Next,
};

use crate::error::{AppError, Result};

/// Install the global Prometheus recorder and return the handle for rendering.
pub fn init_metrics() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| AppError::Internal(format!("failed to install Prometheus recorder: {}", e)))
}

/// Axum middleware that records HTTP request metrics.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let normalized = route_label(&request);

    let start = Instant::now();
    counter!("rag_http_requests_total", "method" => method.clone(), "path" => normalized.clone())
        .increment(1);
    gauge!("rag_http_requests_in_flight", "method" => method.clone(), "path" => normalized.clone())
        .increment(1.0);

    let response = next.run(request).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    histogram!("rag_http_request_duration_seconds", "method" => method.clone(), "path" => normalized.clone(), "status" => status.clone()).record(duration);
    counter!("rag_http_responses_total", "method" => method.clone(), "path" => normalized.clone(), "status" => status).increment(1);
    gauge!("rag_http_requests_in_flight", "method" => method, "path" => normalized).decrement(1.0);

    response
}

/// Label requests by their route template so ids never become label values.
/// Requests that matched no route share one label.
fn route_label(request: &Request<Body>) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_ROUTE.to_string())
}

const UNMATCHED_ROUTE: &str = "unmatched";

/// Record a processed prompt.
pub fn record_prompt(language: &str, policy_flag: bool, confidence_score: f64) {
    counter!("rag_prompts_total", "language" => language.to_string(), "flagged" => policy_flag.to_string()).increment(1);
    histogram!("rag_prompt_confidence_score").record(confidence_score);
}

/// Record policy violations found for one interaction.
pub fn record_policy_violations(violations: &[String]) {
    for violation in violations {
        // "prompt:harmful_violence:kill" -> side "prompt", rule "harmful_violence"
        let mut parts = violation.splitn(3, ':');
        let side = parts.next().unwrap_or_default().to_string();
        let rule = parts.next().unwrap_or_default().to_string();
        counter!("rag_policy_violations_total", "side" => side, "rule" => rule).increment(1);
    }
}

/// Record an applied review decision.
pub fn record_review(decision: &str) {
    counter!("rag_reviews_total", "decision" => decision.to_string()).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::{
        http::HeaderValue,
        middleware,
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    async fn echo_label(request: Request<Body>, next: Next) -> Response<Body> {
        let label = route_label(&request);
        let mut response = next.run(request).await;
        if let Ok(value) = HeaderValue::from_str(&label) {
            response.headers_mut().insert("x-route-label", value);
        }
        response
    }

    async fn label_for(uri: &str) -> String {
        let app = Router::new()
            .nest("/audit", Router::new().route("/:id/events", get(|| async { "ok" })))
            .route("/analytics/stats", get(|| async { "ok" }))
            .layer(middleware::from_fn(echo_label));
        let response = app
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        response.headers()["x-route-label"]
            .to_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_route_label_uses_route_template() {
        assert_eq!(
            label_for("/audit/550e8400-e29b-41d4-a716-446655440000/events").await,
            "/audit/:id/events"
        );
        assert_eq!(label_for("/analytics/stats").await, "/analytics/stats");
    }

    #[tokio::test]
    async fn test_route_label_unmatched_paths_share_one_label() {
        assert_eq!(label_for("/wp-admin/abc123").await, UNMATCHED_ROUTE);
        assert_eq!(label_for("/scan/random-token-9f8e7d").await, UNMATCHED_ROUTE);
    }

    #[test]
    fn test_route_label_without_router() {
        let request = Request::get("/audit/123").body(Body::empty()).unwrap();
        assert_eq!(route_label(&request), UNMATCHED_ROUTE);
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_prompt("en", true, 0.5);
        record_policy_violations(&["prompt:pii_ssn".into(), "response:harmful_hate:hate".into()]);
        record_review("approved");
    }
}
