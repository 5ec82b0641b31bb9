//! HTTP routes of the metrics API

use axum::{
    extract::{RawQuery, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use monitor_lib::metrics_api::CONTAINER_PARAM;
use monitor_lib::stats::StatsService;
use serde_json::json;
use tracing::debug;

/// Static banner served at `/`
pub const BANNER: &str = "Container Metrics API";

async fn banner() -> impl IntoResponse {
    Json(json!({ "message": BANNER }))
}

/// `GET /metrics?container_names=a&container_names=b`
async fn metrics(State(service): State<StatsService>, RawQuery(query): RawQuery) -> impl IntoResponse {
    let containers = container_names(query.as_deref().unwrap_or_default());
    debug!(containers = containers.len(), "Metrics requested");

    Json(service.collect(&containers).await)
}

/// Every `container_names` value in the query string, in request order
pub fn container_names(query: &str) -> Vec<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .filter(|(key, _)| key == CONTAINER_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Create the API router
pub fn create_router(service: StatsService) -> Router {
    Router::new()
        .route("/", get(banner))
        .route("/metrics", get(metrics))
        .with_state(service)
}
