use crate::domain::{MetricPoint, ReaderError, ReaderResult, Sensor};
use crate::metrics::TEMPERATURES;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub enabled: bool,
    /// Normalized probe names that are never reported.
    pub ignored_probes: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            // PMIC-Die reports a constant placeholder on every module
            ignored_probes: vec!["pmic-die".to_owned()],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Probe {
    /// Normalized name, e.g. `cpu`, `gpu`, `tboard`.
    pub name: String,
    pub celsius: f64,
}

pub trait DataSource {
    /// Every probe that currently yields a valid reading. Probes missing on
    /// this hardware revision, or offline, are simply absent.
    fn probes(&self) -> impl Future<Output = Result<Vec<Probe>, ReaderError>> + Send;
}

pub struct Temperature<T> {
    config: Config,
    data_source: T,
}

impl<T> Temperature<T>
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
impl<T> Sensor for Temperature<T>
where
    T: DataSource + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        "temperature"
    }

    fn enabled(&self) -> bool {
        self.config.enabled
    }

    async fn supported(&self) -> bool {
        matches!(self.data_source.probes().await, Ok(probes) if !probes.is_empty())
    }

    async fn sample(&self) -> ReaderResult {
        let probes = self.data_source.probes().await?;

        Ok(probes
            .iter()
            .filter(|p| !self.config.ignored_probes.contains(&p.name))
            .map(|p| MetricPoint::gauge(TEMPERATURES, &[("temperature", p.name.as_str())], p.celsius))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<Probe>);

    impl DataSource for Fixed {
        fn probes(&self) -> impl Future<Output = Result<Vec<Probe>, ReaderError>> + Send {
            let probes = self.0.clone();
            async move { Ok(probes) }
        }
    }

    fn probe(name: &str, celsius: f64) -> Probe {
        Probe {
            name: name.to_owned(),
            celsius,
        }
    }

    #[tokio::test]
    async fn test_missing_probe_is_omitted_without_error() {
        let sensor = Temperature::new(
            Config::default(),
            Fixed(vec![
                probe("ao", 39.5),
                probe("cpu", 41.0),
                probe("gpu", 40.5),
                probe("pmic-die", 100.0),
                probe("tboard", 36.0),
            ]),
        );

        let points = sensor.sample().await.unwrap();
        let labels = points
            .iter()
            .filter_map(|p| p.label("temperature"))
            .collect::<Vec<_>>();

        assert_eq!(labels, vec!["ao", "cpu", "gpu", "tboard"]);
        assert!(!labels.contains(&"tdiode"));
    }
}
