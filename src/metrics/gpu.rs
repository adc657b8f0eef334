use crate::domain::{MetricPoint, ReaderError, ReaderResult, Sensor};
use crate::metrics::{GPU_USAGE, percentage};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub enabled: bool,
    /// Candidate `load` attributes, the first readable one wins.
    pub load_paths: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            load_paths: vec![
                "/sys/devices/gpu.0/load".to_owned(),
                "/sys/devices/platform/gpu.0/load".to_owned(),
                "/sys/devices/17000000.ga10b/load".to_owned(),
                "/sys/devices/17000000.gv11b/load".to_owned(),
                "/sys/devices/57000000.gpu/load".to_owned(),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpuStats {
    /// Utilization percentage.
    pub load: f64,
}

pub trait DataSource {
    fn gpu_load(&self) -> impl Future<Output = Result<GpuStats, ReaderError>> + Send;
}

pub struct GpuUsage<T> {
    config: Config,
    data_source: T,
}

impl<T> GpuUsage<T>
where
    T: DataSource,
{
    pub fn new(config: Config, data_source: T) -> Self {
        Self {
            config,
            data_source,
        }
    }
}

#[async_trait::async_trait]
impl<T> Sensor for GpuUsage<T>
where
    T: DataSource + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        "gpu"
    }

    fn enabled(&self) -> bool {
        self.config.enabled
    }

    async fn supported(&self) -> bool {
        self.data_source.gpu_load().await.is_ok()
    }

    async fn sample(&self) -> ReaderResult {
        let stats = self.data_source.gpu_load().await?;
        Ok(vec![MetricPoint::gauge(
            GPU_USAGE,
            &[("gpu", "val")],
            percentage(stats.load),
        )])
    }
}
