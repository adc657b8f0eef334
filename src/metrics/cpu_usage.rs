use crate::domain::{MetricPoint, ReaderError, ReaderResult, Sensor};
use crate::metrics::{CPU_USAGE, core_label, percentage};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self { enabled: true }
    }
}

pub trait DataSource {
    fn cpu_usage(&self) -> impl Future<Output = Result<CpuUsageStats, ReaderError>> + Send;
}

#[derive(Debug, Clone, Default)]
pub struct CpuUsageStats {
    pub cores: Vec<CoreUsageStats>,
}

#[derive(Debug, Clone)]
pub struct CoreUsageStats {
    /// Kernel core index, 0-based.
    pub core: usize,
    /// Busy ratio in [0, 1].
    pub usage: f64,
}

pub struct CpuUsage<T> {
    config: Config,
    data_source: T,
}

impl<T> CpuUsage<T>
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
impl<T> Sensor for CpuUsage<T>
where
    T: DataSource + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        "cpu_usage"
    }

    fn enabled(&self) -> bool {
        self.config.enabled
    }

    async fn supported(&self) -> bool {
        // also primes the baseline used by the first real sample
        matches!(self.data_source.cpu_usage().await, Ok(stats) if !stats.cores.is_empty())
    }

    #[tracing::instrument(level = "debug", skip_all)]
    async fn sample(&self) -> ReaderResult {
        let stats = self.data_source.cpu_usage().await?;

        Ok(stats
            .cores
            .iter()
            .map(|core| {
                let label = core_label(core.core);
                MetricPoint::gauge(
                    CPU_USAGE,
                    &[("cpu", label.as_str())],
                    percentage(core.usage * 100.0),
                )
            })
            .collect())
    }
}
