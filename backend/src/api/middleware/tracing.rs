//! Request tracing middleware with correlation ID and W3C Trace Context support.
//!
//! Each request runs inside an `http_request` span carrying its correlation
//! ID. Handlers read the ID from the request extensions and stamp it on the
//! audit events they write.

use axum::{
    extract::Request,
    http::{header::HeaderValue, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;
use uuid::Uuid;

pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";

const TRACEPARENT_HEADER: &str = "traceparent";

/// Longest caller-supplied correlation ID that is accepted. Longer values are
/// replaced, since the ID is logged and stored on every audit event.
pub const MAX_CORRELATION_ID_LEN: usize = 128;

/// Correlation ID of the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trace id of a `traceparent` value (`version-traceid-parentid-flags`).
fn trace_id_from_traceparent(value: &str) -> Option<&str> {
    let trace_id = value.split('-').nth(1)?;
    (trace_id.len() == 32 && trace_id.chars().all(|c| c.is_ascii_hexdigit())).then_some(trace_id)
}

/// Pick the correlation ID for a request: explicit header (when at most
/// `MAX_CORRELATION_ID_LEN` characters), then the W3C trace id, then a fresh UUID.
pub fn resolve_correlation_id(headers: &HeaderMap) -> CorrelationId {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    header(CORRELATION_ID_HEADER)
        .filter(|id| id.chars().count() <= MAX_CORRELATION_ID_LEN)
        .map(|id| CorrelationId(id.to_string()))
        .or_else(|| {
            header(TRACEPARENT_HEADER)
                .and_then(trace_id_from_traceparent)
                .map(|id| CorrelationId(id.to_string()))
        })
        .unwrap_or_else(CorrelationId::generate)
}

pub async fn correlation_id_middleware(mut request: Request, next: Next) -> Response {
    let correlation_id = resolve_correlation_id(request.headers());
    let method = request.method().clone();
    let uri = request.uri().path().to_string();

    request.extensions_mut().insert(correlation_id.clone());

    let span = tracing::info_span!(
        "http_request",
        correlation_id = %correlation_id,
        method = %method,
        uri = %uri,
    );

    async move {
        let mut response = next.run(request).await;

        if let Ok(value) = HeaderValue::from_str(correlation_id.as_str()) {
            response.headers_mut().insert(CORRELATION_ID_HEADER, value);
        }

        tracing::info!(status = %response.status().as_u16(), "Request completed");
        response
    }
    .instrument(span)
    .await
}
