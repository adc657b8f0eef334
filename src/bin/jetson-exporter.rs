use jetson_exporter::aggregator::Aggregator;
use jetson_exporter::bootstrap::{build_board_identity, init_sensors};
use jetson_exporter::config::{
    Configuration, get_config_base_path, print_config, should_print_config_and_exit,
};
use jetson_exporter::exposition::SnapshotCollector;
use jetson_exporter::health::HealthMetrics;
use jetson_exporter::logging::setup_logging;
use jetson_exporter::registry::MetricRegistry;
use jetson_exporter::server::shutdown::shutdown_signal;
use jetson_exporter::server::start_server;
use jetson_exporter::server::state::AppState;
use std::sync::Arc;
use tokio::sync::watch;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let configuration = Configuration::load(get_config_base_path(std::env::args()))?;
    if should_print_config_and_exit(std::env::args()) {
        print_config(&configuration)?;
        return Ok(());
    }

    let configuration = Arc::new(configuration);
    let _guard = setup_logging(&configuration.log)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting jetson-exporter");

    let sampling = configuration.sampling.clone();
    let sensors = init_sensors(&configuration.sensors, sampling.reader_timeout()).await?;

    let metrics = Arc::new(MetricRegistry::new());
    let registry = prometheus::Registry::new();
    SnapshotCollector::new(metrics.clone())?.register(&registry)?;

    let health = HealthMetrics::new(sampling.stale_after)?;
    health.register(&registry)?;

    let aggregator = Aggregator::new(sensors, metrics.clone(), health, sampling)
        .with_board_identity(build_board_identity());
    aggregator.refresh_board_info().await;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let sampler = tokio::spawn(aggregator.run(shutdown_rx.clone()));

    let state = AppState {
        configuration,
        registry,
        metrics,
    };

    let served = start_server(state, shutdown_rx).await;
    if served.is_err() {
        // the sampler only stops on a signal
        sampler.abort();
    } else if let Err(e) = sampler.await {
        tracing::error!(error = %e, "Sampling task failed");
    }

    served?;
    tracing::info!("Bye!");

    Ok(())
}
