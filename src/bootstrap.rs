use crate::config::Sensors;
use crate::datasource::TokioReader;
use crate::domain::{BoardIdentity, Sensor};
use crate::{datasource, metrics};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use std::sync::Arc;
use std::time::Duration;

/// Builds every known reader, backed by the host's procfs/sysfs.
pub fn build_sensors(config: &Sensors) -> Vec<Arc<dyn Sensor>> {
    let reader = TokioReader::new();
    let mut sensors: Vec<Arc<dyn Sensor>> = vec![];

    sensors.push(Arc::new(metrics::uptime::Uptime::new(
        config.uptime.clone(),
        datasource::uptime::ProcUptime::new(reader),
    )));
    sensors.push(Arc::new(metrics::cpu_usage::CpuUsage::new(
        config.cpu_usage.clone(),
        datasource::cpu_usage::CpuUsage::new(reader),
    )));
    sensors.push(Arc::new(metrics::cpu_frequency::CpuFrequency::new(
        config.cpu_frequency.clone(),
        datasource::cpu_frequency::CpuFrequency::new(reader),
    )));
    sensors.push(Arc::new(metrics::gpu::GpuUsage::new(
        config.gpu.clone(),
        datasource::gpu::GpuLoad::new(reader, config.gpu.load_paths.clone()),
    )));
    sensors.push(Arc::new(metrics::memory_usage::MemoryUsage::new(
        config.memory.clone(),
        datasource::memory_usage::MemoryUsage::new(reader),
    )));
    sensors.push(Arc::new(metrics::disk::DiskUsage::new(
        config.disk.clone(),
        datasource::disk::MountedDisk::new(config.disk.mount_point.clone()),
    )));
    sensors.push(Arc::new(metrics::fan::FanUsage::new(
        config.fan.clone(),
        datasource::fan::PwmFan::new(reader),
    )));
    sensors.push(Arc::new(metrics::temperature::Temperature::new(
        config.temperature.clone(),
        datasource::thermal::ThermalZones::new(reader),
    )));
    sensors.push(Arc::new(metrics::power::PowerUsage::new(
        config.power.clone(),
        datasource::power::Ina3221::new(reader),
    )));
    sensors.push(Arc::new(metrics::power_mode::PowerMode::new(
        config.power_mode.clone(),
        datasource::power_mode::NvpModel::new(
            reader,
            config.power_mode.status_path.clone(),
            config.power_mode.conf_path.clone(),
        ),
    )));

    sensors
}

pub fn build_board_identity() -> Arc<dyn BoardIdentity> {
    Arc::new(metrics::board_info::Board::new(
        datasource::board::HostBoard::new(TokioReader::new()),
    ))
}

/// Drops disabled readers and the ones this host does not support. Each
/// support probe gets at most `probe_timeout`.
pub async fn select_sensors(
    sensors: Vec<Arc<dyn Sensor>>,
    probe_timeout: Duration,
) -> anyhow::Result<Vec<Arc<dyn Sensor>>> {
    let mut probes = FuturesUnordered::new();

    for (idx, sensor) in sensors.iter().enumerate() {
        if !sensor.enabled() {
            tracing::info!(reader = sensor.name(), "Reader disabled by configuration");
            continue;
        }

        let sensor = Arc::clone(sensor);
        probes.push(async move {
            let supported = tokio::time::timeout(probe_timeout, sensor.supported())
                .await
                .unwrap_or(false);
            (idx, supported)
        });
    }

    let mut supported = vec![];
    while let Some((idx, is_supported)) = probes.next().await {
        if is_supported {
            supported.push(idx);
        } else {
            tracing::info!(reader = sensors[idx].name(), "Reader not supported on this host");
        }
    }

    // keep the configured order regardless of probe completion order
    supported.sort_unstable();
    let selected = supported
        .into_iter()
        .map(|idx| Arc::clone(&sensors[idx]))
        .collect::<Vec<_>>();

    if selected.is_empty() {
        anyhow::bail!("No sensor reader is enabled and supported on this host");
    }

    for sensor in &selected {
        tracing::info!(reader = sensor.name(), "Reader enabled");
    }

    Ok(selected)
}

pub async fn init_sensors(
    config: &Sensors,
    probe_timeout: Duration,
) -> anyhow::Result<Vec<Arc<dyn Sensor>>> {
    select_sensors(build_sensors(config), probe_timeout).await
}
