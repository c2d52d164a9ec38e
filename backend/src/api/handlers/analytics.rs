//! Review analytics handler.

use axum::{extract::State, routing::get, Json, Router};
use utoipa::OpenApi;

use crate::api::SharedState;
use crate::error::Result;
use crate::services::analytics_service::{AnalyticsService, AnalyticsStats};

pub fn router() -> Router<SharedState> {
    Router::new().route("/analytics/stats", get(get_stats))
}

/// GET /analytics/stats - review statistics over the most recent 1000 audit logs
#[utoipa::path(
    get,
    path = "/analytics/stats",
    tag = "analytics",
    responses(
        (status = 200, description = "Review statistics", body = AnalyticsStats),
    )
)]
pub async fn get_stats(State(state): State<SharedState>) -> Result<Json<AnalyticsStats>> {
    let stats = AnalyticsService::new(state.store.clone()).stats().await?;
    Ok(Json(stats))
}

#[derive(OpenApi)]
#[openapi(paths(get_stats), components(schemas(AnalyticsStats)))]
pub struct AnalyticsApiDoc;
