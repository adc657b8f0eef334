use crate::domain::MetricPoint;
use crate::exposition::render;
use crate::registry::MetricRegistry;
use axum::Json;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use prometheus::Registry;
use serde::Serialize;
use std::sync::Arc;

pub async fn health_check() -> &'static str {
    "OK"
}

/// Always answers 200: a failed encode is logged and yields an empty body, as
/// the scrape protocol has no way to signal partial data.
pub async fn metrics(State(registry): State<Registry>) -> impl IntoResponse {
    let body = render(&registry).unwrap_or_else(|error| {
        tracing::error!(%error, "Failed to encode metrics");
        String::new()
    });

    (
        [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
        body,
    )
}

#[derive(Debug, Serialize)]
pub struct SnapshotView {
    pub sequence: u64,
    pub timestamp_ms: u64,
    pub points: Vec<MetricPoint>,
}

pub async fn snapshot(State(metrics): State<Arc<MetricRegistry>>) -> Json<SnapshotView> {
    let current = metrics.current();

    Json(SnapshotView {
        sequence: current.sequence(),
        timestamp_ms: current.timestamp_ms(),
        points: current.points().to_vec(),
    })
}
