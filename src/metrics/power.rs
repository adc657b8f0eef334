use crate::domain::{MetricPoint, ReaderError, ReaderResult, Sensor};
use crate::metrics::{CURRENT, POWER, VOLTAGE};
use serde::{Deserialize, Serialize};

/// Rails that measure the whole board input rather than a single domain.
const INPUT_RAILS: &[&str] = &["in", "5v_in", "sys5v_in"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub enabled: bool,
    /// Rail whose power is reported as `tot`. Defaults to the board input
    /// rail when one exists, otherwise the sum of all rails.
    pub total_rail: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            total_rail: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rail {
    /// Normalized rail name, e.g. `cpu`, `gpu`, `soc`, `sys5v`.
    pub name: String,
    pub milliwatts: f64,
    pub millivolts: Option<f64>,
    pub milliamps: Option<f64>,
}

pub trait DataSource {
    fn rails(&self) -> impl Future<Output = Result<Vec<Rail>, ReaderError>> + Send;
}

pub struct PowerUsage<T> {
    config: Config,
    data_source: T,
}

impl<T> PowerUsage<T>
where
    T: DataSource,
{
    pub fn new(config: Config, data_source: T) -> Self {
        Self {
            config,
            data_source,
        }
    }

    fn total(&self, rails: &[Rail]) -> f64 {
        let by_name = |name: &str| rails.iter().find(|r| r.name == name).map(|r| r.milliwatts);

        if let Some(rail) = &self.config.total_rail {
            if let Some(total) = by_name(rail) {
                return total;
            }

            tracing::debug!(%rail, "Configured total power rail is not present");
        }

        INPUT_RAILS
            .iter()
            .find_map(|name| by_name(name))
            .unwrap_or_else(|| rails.iter().map(|r| r.milliwatts).sum())
    }
}

#[async_trait::async_trait]
impl<T> Sensor for PowerUsage<T>
where
    T: DataSource + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        "power"
    }

    fn enabled(&self) -> bool {
        self.config.enabled
    }

    async fn supported(&self) -> bool {
        matches!(self.data_source.rails().await, Ok(rails) if !rails.is_empty())
    }

    async fn sample(&self) -> ReaderResult {
        let rails = self.data_source.rails().await?;
        let mut points = Vec::with_capacity(rails.len() * 3 + 1);

        for rail in &rails {
            let name = rail.name.as_str();
            points.push(MetricPoint::gauge(POWER, &[("power", name)], rail.milliwatts.max(0.0)));

            if let Some(mv) = rail.millivolts {
                points.push(MetricPoint::gauge(VOLTAGE, &[("voltage", name)], mv.max(0.0)));
            }

            if let Some(ma) = rail.milliamps {
                points.push(MetricPoint::gauge(CURRENT, &[("current", name)], ma.max(0.0)));
            }
        }

        if !rails.is_empty() {
            points.push(MetricPoint::gauge(POWER, &[("power", "tot")], self.total(&rails).max(0.0)));
        }

        Ok(points)
    }
}
