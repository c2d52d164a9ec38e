//! OpenAPI specification generated from handler annotations via utoipa.

use utoipa::OpenApi;

/// Top-level OpenAPI document.
///
/// Each handler module contributes its paths and schemas through its own
/// `#[derive(OpenApi)]` struct, merged in [`build_openapi`].
#[derive(OpenApi)]
#[openapi(
    info(
        title = "RAG Governance API",
        description = "Retrieval-augmented answers with policy screening, audit logging and human review.",
        version = "1.0.0",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "/", description = "Current server"),
    ),
    tags(
        (name = "prompt", description = "RAG pipeline"),
        (name = "audit", description = "Audit logs and governance trail"),
        (name = "review", description = "Human-in-the-loop review"),
        (name = "analytics", description = "Review statistics"),
        (name = "health", description = "Service info and health checks"),
    ),
    components(schemas(ErrorResponse))
)]
pub struct ApiDoc;

/// Standard error response body returned by all endpoints on failure.
#[derive(serde::Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    /// Machine-readable error code (e.g. "NOT_FOUND", "VALIDATION_ERROR")
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

/// Build the merged OpenAPI document from all handler modules.
pub fn build_openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();

    doc.merge(super::handlers::prompt::PromptApiDoc::openapi());
    doc.merge(super::handlers::audit::AuditApiDoc::openapi());
    doc.merge(super::handlers::review::ReviewApiDoc::openapi());
    doc.merge(super::handlers::analytics::AnalyticsApiDoc::openapi());
    doc.merge(super::handlers::health::HealthApiDoc::openapi());

    doc
}
