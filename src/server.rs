use crate::server::state::AppState;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::get;
use std::error::Error;
use std::net::ToSocketAddrs;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower::Layer;
use tower_http::LatencyUnit;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::normalize_path::NormalizePathLayer;
use tower_http::request_id::{
    MakeRequestUuid, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::Level;

pub mod handler;
pub mod shutdown;
pub mod state;

/// Resolves once `shutdown` flips to `true` or its sender goes away.
async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Serves on every address the configured host resolves to, until `shutdown`
/// is signalled.
pub async fn start_server(
    state: AppState,
    shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let config = state.configuration.clone();
    let router = create_router(state);

    let mut handles = Vec::new();
    for addr in (config.http.address.as_str(), config.http.port).to_socket_addrs()? {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| format!("Could not bind to {}: {}", addr, e))?;

        tracing::info!("Listening on {}", listener.local_addr()?);

        let router = router.clone();
        let shutdown = shutdown.clone();
        let handle = tokio::task::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(wait_for_shutdown(shutdown))
                .await
        });

        handles.push(handle);
    }

    if handles.is_empty() {
        return Err(format!(
            "The bind address [{}:{}] did not resolve to any IP addresses",
            config.http.address, config.http.port
        )
        .into());
    }

    for handle in handles {
        match handle.await {
            Ok(Ok(())) => (),
            Ok(Err(e)) => return Err(format!("Server failed: {}", e).into()),
            Err(e) => return Err(format!("Server task panicked: {}", e).into()),
        }
    }

    Ok(())
}

fn create_router(state: AppState) -> Router {
    let router = Router::new()
        .route("/metrics", get(handler::metrics))
        .route("/health", get(handler::health_check))
        .route("/snapshot", get(handler::snapshot))
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::INTERNAL_SERVER_ERROR,
            Duration::from_millis(state.configuration.http.timeout),
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<Body>| {
                    let request_id = request
                        .extensions()
                        .get::<RequestId>()
                        .map(|id| id.header_value().to_str().unwrap_or("unknown"))
                        .unwrap_or("unknown");

                    tracing::info_span!(
                        "http_request",
                        request_id = %request_id,
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                })
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .latency_unit(LatencyUnit::Millis),
                ),
        )
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state);

    Router::new().fallback_service(NormalizePathLayer::trim_trailing_slash().layer(router))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;
    use crate::domain::{MetricPoint, Snapshot};
    use crate::exposition::SnapshotCollector;
    use crate::health::HealthMetrics;
    use crate::registry::MetricRegistry;
    use axum::body::to_bytes;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn state() -> AppState {
        let metrics = Arc::new(MetricRegistry::new());
        metrics
            .publish(Snapshot::new(
                3,
                vec![
                    MetricPoint::gauge("jetson_usage_gpu", &[("gpu", "val")], 43.7),
                    MetricPoint::gauge("jetson_usage_fan", &[("fan", "speed")], 20),
                ],
            ))
            .unwrap();

        let registry = prometheus::Registry::new();
        SnapshotCollector::new(metrics.clone())
            .unwrap()
            .register(&registry)
            .unwrap();
        HealthMetrics::new(3).unwrap().register(&registry).unwrap();

        AppState {
            configuration: Arc::new(Configuration::default()),
            registry,
            metrics,
        }
    }

    async fn get(uri: &str) -> (StatusCode, String) {
        let response = create_router(state())
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let (status, body) = get("/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("jetson_usage_gpu{gpu=\"val\"} 43.7"));
        assert!(body.contains("jetson_usage_fan{fan=\"speed\"} 20"));
        assert!(body.contains("jetson_exporter_up 1"));
    }

    #[tokio::test]
    async fn test_trailing_slash_is_normalized() {
        let (status, body) = get("/metrics/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("jetson_usage_gpu"));
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (status, body) = get("/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "OK");
    }

    #[tokio::test]
    async fn test_snapshot_endpoint() {
        let (status, body) = get("/snapshot").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["sequence"], 3);
        assert_eq!(json["points"].as_array().unwrap().len(), 2);
        assert_eq!(json["points"][0]["labels"]["gpu"], "val");
        assert_eq!(json["points"][0]["kind"], "gauge");
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let (status, _) = get("/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
