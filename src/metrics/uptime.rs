use crate::domain::{MetricPoint, ReaderError, ReaderResult, Sensor};
use crate::metrics::UPTIME;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub enabled: bool,
    /// Also publish the `days`, `hours` and `minutes` components.
    pub breakdown: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            breakdown: false,
        }
    }
}

pub trait DataSource {
    fn uptime(&self) -> impl Future<Output = Result<Duration, ReaderError>> + Send;
}

pub struct Uptime<T> {
    config: Config,
    data_source: T,
    last: Mutex<Duration>,
}

impl<T> Uptime<T>
where
    T: DataSource,
{
    pub fn new(config: Config, data_source: T) -> Self {
        Self {
            config,
            data_source,
            last: Mutex::new(Duration::ZERO),
        }
    }
}

#[async_trait::async_trait]
impl<T> Sensor for Uptime<T>
where
    T: DataSource + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        "uptime"
    }

    fn enabled(&self) -> bool {
        self.config.enabled
    }

    async fn supported(&self) -> bool {
        self.data_source.uptime().await.is_ok()
    }

    async fn sample(&self) -> ReaderResult {
        let current = self.data_source.uptime().await?;

        // Published uptime never goes backwards within one process
        let uptime = {
            let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
            *last = (*last).max(current);
            *last
        };

        let mut points = vec![MetricPoint::gauge(
            UPTIME,
            &[("uptime", "seconds")],
            uptime.as_secs_f64(),
        )];

        if self.config.breakdown {
            let secs = uptime.as_secs();
            points.push(MetricPoint::gauge(UPTIME, &[("uptime", "days")], secs / 86_400));
            points.push(MetricPoint::gauge(UPTIME, &[("uptime", "hours")], (secs % 86_400) / 3600));
            points.push(MetricPoint::gauge(UPTIME, &[("uptime", "minutes")], (secs / 60) % 60));
        }

        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct Scripted(Mutex<VecDeque<Duration>>);

    impl Scripted {
        fn new(values: &[u64]) -> Self {
            Self(Mutex::new(values.iter().map(|s| Duration::from_secs(*s)).collect()))
        }
    }

    impl DataSource for Scripted {
        fn uptime(&self) -> impl Future<Output = Result<Duration, ReaderError>> + Send {
            let next = self.0.lock().unwrap().pop_front();
            async move { next.ok_or_else(|| ReaderError::unavailable("exhausted")) }
        }
    }

    #[tokio::test]
    async fn test_uptime_never_decreases() {
        let sensor = Uptime::new(Config::default(), Scripted::new(&[100, 90, 120]));

        let mut values = vec![];
        for _ in 0..3 {
            let points = sensor.sample().await.unwrap();
            assert_eq!(points.len(), 1);
            values.push(points[0].value);
        }

        assert_eq!(values, vec![100.0, 100.0, 120.0]);
    }

    #[tokio::test]
    async fn test_breakdown() {
        let config = Config {
            enabled: true,
            breakdown: true,
        };

        // 2 days, 3 hours, 4 minutes, 5 seconds
        let sensor = Uptime::new(config, Scripted::new(&[2 * 86_400 + 3 * 3600 + 4 * 60 + 5]));
        let points = sensor.sample().await.unwrap();

        let value = |label: &str| {
            points
                .iter()
                .find(|p| p.label("uptime") == Some(label))
                .map(|p| p.value)
        };

        assert_eq!(value("days"), Some(2.0));
        assert_eq!(value("hours"), Some(3.0));
        assert_eq!(value("minutes"), Some(4.0));
        assert_eq!(value("seconds"), Some(183_845.0));
    }
}
