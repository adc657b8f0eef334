use crate::domain::{MetricPoint, ReaderError, ReaderResult, Sensor};
use crate::metrics::{CPU_FREQUENCY, core_label};
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

#[derive(Debug, Clone, Default)]
pub struct CpuFreqStats {
    /// (kernel core index, frequency in Hz) for every online core.
    pub cores: Vec<(usize, u64)>,
}

pub trait DataSource {
    fn cpu_freq(&self) -> impl Future<Output = Result<CpuFreqStats, ReaderError>> + Send;
}

pub struct CpuFrequency<T> {
    config: Config,
    data_source: T,
}

impl<T> CpuFrequency<T>
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
impl<T> Sensor for CpuFrequency<T>
where
    T: DataSource + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        "cpu_frequency"
    }

    fn enabled(&self) -> bool {
        self.config.enabled
    }

    async fn supported(&self) -> bool {
        self.data_source.cpu_freq().await.is_ok()
    }

    async fn sample(&self) -> ReaderResult {
        let stats = self.data_source.cpu_freq().await?;

        Ok(stats
            .cores
            .into_iter()
            .map(|(core, hz)| {
                let label = core_label(core);
                MetricPoint::gauge(CPU_FREQUENCY, &[("cpu", label.as_str())], hz)
            })
            .collect())
    }
}
