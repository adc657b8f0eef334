use crate::domain::{MetricPoint, ReaderError, ReaderResult, Sensor};
use crate::metrics::{RAM_USAGE, SWAP_USAGE};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub enabled: bool,
    pub report_swap: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            report_swap: true,
        }
    }
}

#[derive(Default, Debug, Clone, Eq, PartialEq)]
pub struct SwapStats {
    pub total: u64,
    pub used: u64,
    pub free: u64,
}

#[derive(Default, Debug, Clone, Eq, PartialEq)]
pub struct RamStats {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub shared: u64,
}

#[derive(Default, Debug, Clone, Eq, PartialEq)]
pub struct MemoryStats {
    pub ram: RamStats,
    pub swap: SwapStats,
}

pub trait DataSource {
    fn memory(&self) -> impl Future<Output = Result<MemoryStats, ReaderError>> + Send;
}

pub struct MemoryUsage<T> {
    config: Config,
    data_source: T,
}

impl<T> MemoryUsage<T>
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
impl<T> Sensor for MemoryUsage<T>
where
    T: DataSource + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        "memory"
    }

    fn enabled(&self) -> bool {
        self.config.enabled
    }

    async fn supported(&self) -> bool {
        matches!(self.data_source.memory().await, Ok(stats) if stats.ram.total > 0)
    }

    async fn sample(&self) -> ReaderResult {
        let MemoryStats { ram, swap } = self.data_source.memory().await?;

        // used and shared can never exceed the physical memory
        let bounded = |v: u64| v.min(ram.total);

        let mut points = vec![
            MetricPoint::gauge(RAM_USAGE, &[("ram", "used")], bounded(ram.used)),
            MetricPoint::gauge(RAM_USAGE, &[("ram", "shared")], bounded(ram.shared)),
            MetricPoint::gauge(RAM_USAGE, &[("ram", "total")], ram.total),
            MetricPoint::gauge(RAM_USAGE, &[("ram", "free")], bounded(ram.free)),
        ];

        if self.config.report_swap {
            points.push(MetricPoint::gauge(SWAP_USAGE, &[("swap", "used")], swap.used));
            points.push(MetricPoint::gauge(SWAP_USAGE, &[("swap", "total")], swap.total));
            points.push(MetricPoint::gauge(SWAP_USAGE, &[("swap", "free")], swap.free));
        }

        Ok(points)
    }
}
