use crate::domain::{MetricPoint, ReaderError, ReaderResult, Sensor};
use crate::metrics::DISK_USAGE;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub enabled: bool,
    pub mount_point: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            mount_point: "/".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct DiskStats {
    pub total: u64,
    /// Space available to unprivileged users.
    pub available: u64,
}

pub trait DataSource {
    fn disk_space(&self) -> impl Future<Output = Result<DiskStats, ReaderError>> + Send;
}

pub struct DiskUsage<T> {
    config: Config,
    data_source: T,
}

impl<T> DiskUsage<T>
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
impl<T> Sensor for DiskUsage<T>
where
    T: DataSource + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        "disk"
    }

    fn enabled(&self) -> bool {
        self.config.enabled
    }

    async fn supported(&self) -> bool {
        self.data_source.disk_space().await.is_ok()
    }

    async fn sample(&self) -> ReaderResult {
        let stats = self.data_source.disk_space().await?;
        let available = stats.available.min(stats.total);

        Ok(vec![
            MetricPoint::gauge(DISK_USAGE, &[("disk", "available")], available),
            MetricPoint::gauge(DISK_USAGE, &[("disk", "used")], stats.total - available),
            MetricPoint::gauge(DISK_USAGE, &[("disk", "total")], stats.total),
        ])
    }
}
