use crate::domain::{MetricPoint, ReaderError, ReaderResult, Sensor};
use crate::metrics::{FAN_USAGE, percentage};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub enabled: bool,
    /// Used to derive the speed percentage when only a tachometer is present.
    pub max_rpm: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            max_rpm: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FanStats {
    /// Duty cycle percentage, when the PWM is readable.
    pub speed: Option<f64>,
    pub rpm: Option<u32>,
}

pub trait DataSource {
    fn fan(&self) -> impl Future<Output = Result<FanStats, ReaderError>> + Send;
}

pub struct FanUsage<T> {
    config: Config,
    data_source: T,
}

impl<T> FanUsage<T>
where
    T: DataSource,
{
    pub fn new(config: Config, data_source: T) -> Self {
        Self {
            config,
            data_source,
        }
    }

    fn speed(&self, stats: &FanStats) -> Option<f64> {
        if let Some(speed) = stats.speed {
            return Some(speed);
        }

        match (stats.rpm, self.config.max_rpm) {
            (Some(rpm), Some(max)) if max > 0 => Some(rpm as f64 * 100.0 / max as f64),
            _ => None,
        }
    }
}

#[async_trait::async_trait]
impl<T> Sensor for FanUsage<T>
where
    T: DataSource + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        "fan"
    }

    fn enabled(&self) -> bool {
        self.config.enabled
    }

    async fn supported(&self) -> bool {
        // passively cooled modules have no fan at all
        matches!(self.data_source.fan().await, Ok(stats) if stats.speed.is_some() || stats.rpm.is_some())
    }

    async fn sample(&self) -> ReaderResult {
        let stats = self.data_source.fan().await?;
        let mut points = vec![];

        if let Some(speed) = self.speed(&stats) {
            points.push(MetricPoint::gauge(
                FAN_USAGE,
                &[("fan", "speed")],
                percentage(speed),
            ));
        }

        if let Some(rpm) = stats.rpm {
            points.push(MetricPoint::gauge(FAN_USAGE, &[("fan", "rpm")], rpm));
        }

        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(FanStats);

    impl DataSource for Fixed {
        fn fan(&self) -> impl Future<Output = Result<FanStats, ReaderError>> + Send {
            let stats = self.0;
            async move { Ok(stats) }
        }
    }

    #[tokio::test]
    async fn test_speed_and_rpm() {
        let sensor = FanUsage::new(
            Config::default(),
            Fixed(FanStats {
                speed: Some(50.2),
                rpm: Some(2150),
            }),
        );

        let points = sensor.sample().await.unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].label("fan"), Some("speed"));
        assert_eq!(points[0].value, 50.2);
        assert_eq!(points[1].label("fan"), Some("rpm"));
        assert_eq!(points[1].value, 2150.0);
    }

    #[tokio::test]
    async fn test_rpm_normalized_to_percentage() {
        let config = Config {
            enabled: true,
            max_rpm: Some(5000),
        };

        let sensor = FanUsage::new(
            config,
            Fixed(FanStats {
                speed: None,
                rpm: Some(1250),
            }),
        );

        let points = sensor.sample().await.unwrap();
        assert_eq!(points[0].label("fan"), Some("speed"));
        assert_eq!(points[0].value, 25.0);
    }

    #[tokio::test]
    async fn test_no_fan_is_unsupported() {
        let sensor = FanUsage::new(Config::default(), Fixed(FanStats::default()));
        assert!(!sensor.supported().await);
    }
}
