//! Route definitions for the API.

use axum::{middleware, Router};
use utoipa_swagger_ui::SwaggerUi;

use super::handlers;
use super::middleware::tracing::correlation_id_middleware;
use super::SharedState;
use crate::services::metrics_service::metrics_middleware;

/// Create the main API router
pub fn create_router(state: SharedState) -> Router {
    let openapi = super::openapi::build_openapi();

    Router::new()
        .merge(handlers::health::router())
        .merge(handlers::prompt::router())
        .nest("/audit", handlers::audit::router())
        .merge(handlers::review::router())
        .merge(handlers::analytics::router())
        .merge(SwaggerUi::new("/swagger-ui").url("/openapi.json", openapi))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(correlation_id_middleware))
        .with_state(state)
}
