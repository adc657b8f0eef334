use crate::domain::{MetricPoint, ReaderError, ReaderResult, Sensor};
use crate::metrics::POWER_MODE;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub enabled: bool,
    pub status_path: String,
    pub conf_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            status_path: "/var/lib/nvpmodel/status".to_owned(),
            conf_path: "/etc/nvpmodel.conf".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowerModeStats {
    pub id: u32,
    pub name: String,
}

pub trait DataSource {
    fn power_mode(&self) -> impl Future<Output = Result<PowerModeStats, ReaderError>> + Send;
}

pub struct PowerMode<T> {
    config: Config,
    data_source: T,
}

impl<T> PowerMode<T>
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
impl<T> Sensor for PowerMode<T>
where
    T: DataSource + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        "power_mode"
    }

    fn enabled(&self) -> bool {
        self.config.enabled
    }

    async fn supported(&self) -> bool {
        self.data_source.power_mode().await.is_ok()
    }

    async fn sample(&self) -> ReaderResult {
        let mode = self.data_source.power_mode().await?;
        Ok(vec![MetricPoint::gauge(
            POWER_MODE,
            &[("nvpmode", "mode"), ("mode", mode.name.as_str())],
            1,
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    impl DataSource for Fixed {
        fn power_mode(&self) -> impl Future<Output = Result<PowerModeStats, ReaderError>> + Send {
            async move {
                Ok(PowerModeStats {
                    id: 2,
                    name: "MODE_15W_6CORE".to_owned(),
                })
            }
        }
    }

    #[tokio::test]
    async fn test_power_mode_info() {
        let points = PowerMode::new(Config::default(), Fixed).sample().await.unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].label("nvpmode"), Some("mode"));
        assert_eq!(points[0].label("mode"), Some("MODE_15W_6CORE"));
        assert_eq!(points[0].value, 1.0);
    }
}
