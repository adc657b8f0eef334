use crate::datasource::hwmon::find_devices;
use crate::datasource::{Reader, read_value};
use crate::domain::ReaderError;
use crate::metrics::fan::{DataSource, FanStats};

const PATH_LEGACY_PWM: &str = "/sys/devices/pwm-fan/target_pwm";
const PATH_LEGACY_RPM: &str = "/sys/devices/pwm-fan/rpm_measured";
const MAX_PWM: f64 = 255.0;

/// Tegra PWM fan, either through the legacy `pwm-fan` device (L4T 32) or the
/// `pwmfan` / `pwm_tach` hwmon devices (L4T 34+).
pub struct PwmFan<R> {
    reader: R,
}

impl<R> PwmFan<R>
where
    R: Reader,
{
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    async fn legacy(&self) -> Option<FanStats> {
        let pwm = read_value::<_, f64>(&self.reader, PATH_LEGACY_PWM).await.ok()?;
        let rpm = read_value::<_, u32>(&self.reader, PATH_LEGACY_RPM).await.ok();

        Some(FanStats {
            speed: Some(pwm * 100.0 / MAX_PWM),
            rpm,
        })
    }

    async fn hwmon(&self) -> Result<FanStats, ReaderError> {
        let mut stats = FanStats::default();

        let fans = find_devices(&self.reader, |name| name == "pwmfan" || name == "pwm-fan").await;
        if let Some(dir) = fans.first() {
            let pwm = read_value::<_, f64>(&self.reader, dir.join("pwm1")).await?;
            stats.speed = Some(pwm * 100.0 / MAX_PWM);
        }

        let tachs = find_devices(&self.reader, |name| name == "pwm_tach" || name == "pwm-tach").await;
        if let Some(dir) = tachs.first() {
            // the tachometer is optional, the duty cycle alone is enough
            stats.rpm = read_value::<_, u32>(&self.reader, dir.join("fan1_input"))
                .await
                .inspect_err(|e| tracing::trace!(error = %e, "Fan tachometer is not readable"))
                .ok();
        }

        Ok(stats)
    }
}

impl<R> DataSource for PwmFan<R>
where
    R: Reader,
{
    #[allow(clippy::manual_async_fn)]
    fn fan(&self) -> impl Future<Output = Result<FanStats, ReaderError>> + Send {
        async move {
            if let Some(stats) = self.legacy().await {
                return Ok(stats);
            }

            self.hwmon().await
        }
    }
}
