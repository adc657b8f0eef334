use crate::config::Configuration;
use crate::registry::MetricRegistry;
use axum::extract::FromRef;
use prometheus::Registry;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub configuration: Arc<Configuration>,
    /// Prometheus registry holding the snapshot collector and the health metrics.
    pub registry: Registry,
    pub metrics: Arc<MetricRegistry>,
}

impl FromRef<AppState> for Arc<MetricRegistry> {
    fn from_ref(state: &AppState) -> Self {
        state.metrics.clone()
    }
}

impl FromRef<AppState> for Registry {
    fn from_ref(state: &AppState) -> Self {
        state.registry.clone()
    }
}
