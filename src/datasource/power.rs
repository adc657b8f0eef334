use crate::datasource::hwmon::find_devices;
use crate::datasource::{Reader, read_value};
use crate::domain::ReaderError;
use crate::metrics::power::{DataSource, Rail};
use std::path::{Path, PathBuf};

const PATH_LEGACY_DRIVER: &str = "/sys/bus/i2c/drivers/ina3221x";
const HWMON_CHANNELS: usize = 4;
const LEGACY_CHANNELS: usize = 3;

/// INA3221 power monitors, through hwmon (L4T 34+) or the legacy IIO driver (L4T 32).
pub struct Ina3221<R> {
    reader: R,
}

/// `VDD_CPU_GPU_CV` -> `cpu_gpu_cv`, `POM_5V_GPU` -> `5v_gpu`, `VDDRQ` -> `vddrq`.
pub(crate) fn normalize_rail_name(raw: &str) -> Option<String> {
    let name = raw.trim().to_lowercase();
    if name.is_empty() || name == "nc" || name.starts_with("sum of") {
        return None;
    }

    let name = name
        .strip_prefix("vdd_")
        .or_else(|| name.strip_prefix("pom_"))
        .unwrap_or(&name);

    Some(name.replace(' ', "_"))
}

impl<R> Ina3221<R>
where
    R: Reader,
{
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    async fn hwmon_rails(&self) -> Vec<Rail> {
        let mut rails = vec![];

        for dir in find_devices(&self.reader, |name| name.starts_with("ina3221")).await {
            for channel in 1..=HWMON_CHANNELS {
                if let Some(rail) = self.hwmon_rail(&dir, channel).await {
                    rails.push(rail);
                }
            }
        }

        rails
    }

    async fn hwmon_rail(&self, dir: &Path, channel: usize) -> Option<Rail> {
        let label = self
            .reader
            .read_to_string(dir.join(format!("in{}_label", channel)))
            .await
            .ok()?;
        let name = normalize_rail_name(&label)?;

        let millivolts = read_value::<_, f64>(&self.reader, dir.join(format!("in{}_input", channel)))
            .await
            .ok()?;
        let milliamps = read_value::<_, f64>(&self.reader, dir.join(format!("curr{}_input", channel)))
            .await
            .ok()?;

        Some(Rail {
            name,
            milliwatts: millivolts * milliamps / 1000.0,
            millivolts: Some(millivolts),
            milliamps: Some(milliamps),
        })
    }

    async fn legacy_devices(&self) -> Vec<PathBuf> {
        let Ok(buses) = self.reader.list_dir(PATH_LEGACY_DRIVER).await else {
            return vec![];
        };

        let mut devices = vec![];
        for bus in buses.iter().filter(|b| b.contains('-')) {
            let bus_dir = PathBuf::from(PATH_LEGACY_DRIVER).join(bus);
            let Ok(entries) = self.reader.list_dir(&bus_dir).await else {
                continue;
            };

            devices.extend(
                entries
                    .iter()
                    .filter(|e| e.starts_with("iio:device"))
                    .map(|e| bus_dir.join(e)),
            );
        }

        devices
    }

    async fn legacy_rails(&self) -> Vec<Rail> {
        let mut rails = vec![];

        for dir in self.legacy_devices().await {
            for channel in 0..LEGACY_CHANNELS {
                let Ok(label) = self
                    .reader
                    .read_to_string(dir.join(format!("rail_name_{}", channel)))
                    .await
                else {
                    continue;
                };

                let Some(name) = normalize_rail_name(&label) else {
                    continue;
                };

                let Ok(milliwatts) =
                    read_value::<_, f64>(&self.reader, dir.join(format!("in_power{}_input", channel))).await
                else {
                    continue;
                };

                let millivolts =
                    read_value::<_, f64>(&self.reader, dir.join(format!("in_voltage{}_input", channel)))
                        .await
                        .ok();
                let milliamps =
                    read_value::<_, f64>(&self.reader, dir.join(format!("in_current{}_input", channel)))
                        .await
                        .ok();

                rails.push(Rail {
                    name,
                    milliwatts,
                    millivolts,
                    milliamps,
                });
            }
        }

        rails
    }
}

impl<R> DataSource for Ina3221<R>
where
    R: Reader,
{
    #[allow(clippy::manual_async_fn)]
    fn rails(&self) -> impl Future<Output = Result<Vec<Rail>, ReaderError>> + Send {
        async move {
            let mut rails = self.hwmon_rails().await;
            if rails.is_empty() {
                rails = self.legacy_rails().await;
            }

            if rails.is_empty() {
                return Err(ReaderError::unavailable("no INA3221 power monitor found"));
            }

            Ok(rails)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::tests::HardcodedReader;

    #[test]
    fn test_normalize_rail_name() {
        assert_eq!(normalize_rail_name("VDD_CPU_GPU_CV\n").as_deref(), Some("cpu_gpu_cv"));
        assert_eq!(normalize_rail_name("VDD_IN").as_deref(), Some("in"));
        assert_eq!(normalize_rail_name("POM_5V_GPU").as_deref(), Some("5v_gpu"));
        assert_eq!(normalize_rail_name("SYS5V").as_deref(), Some("sys5v"));
        assert_eq!(normalize_rail_name("VDDRQ").as_deref(), Some("vddrq"));
        assert_eq!(normalize_rail_name("NC"), None);
        assert_eq!(normalize_rail_name("sum of shunt voltages"), None);
    }

    #[tokio::test]
    async fn test_hwmon_layout() {
        let dir = "/sys/class/hwmon/hwmon1";
        let mut reader = HardcodedReader::new();
        reader.add_response(format!("{}/name", dir), "ina3221\n");
        reader.add_response(format!("{}/in1_label", dir), "VDD_IN\n");
        reader.add_response(format!("{}/in1_input", dir), "5000\n");
        reader.add_response(format!("{}/curr1_input", dir), "960\n");
        reader.add_response(format!("{}/in2_label", dir), "VDD_CPU_GPU_CV\n");
        reader.add_response(format!("{}/in2_input", dir), "5000\n");
        reader.add_response(format!("{}/curr2_input", dir), "300\n");
        reader.add_response(format!("{}/in3_label", dir), "VDD_SOC\n");
        reader.add_response(format!("{}/in3_input", dir), "5000\n");
        reader.add_response(format!("{}/curr3_input", dir), "220\n");
        reader.add_response(format!("{}/in7_label", dir), "sum of shunt voltages\n");

        let rails = Ina3221::new(reader).rails().await.unwrap();
        assert_eq!(rails.len(), 3);
        assert_eq!(rails[0].name, "in");
        assert_eq!(rails[0].milliwatts, 4800.0);
        assert_eq!(rails[1].name, "cpu_gpu_cv");
        assert_eq!(rails[1].milliwatts, 1500.0);
        assert_eq!(rails[2].millivolts, Some(5000.0));
        assert_eq!(rails[2].milliamps, Some(220.0));
    }

    #[tokio::test]
    async fn test_legacy_iio_layout() {
        let dir = "/sys/bus/i2c/drivers/ina3221x/1-0040/iio:device0";
        let mut reader = HardcodedReader::new();
        reader.add_response("/sys/bus/i2c/drivers/ina3221x/bind", "");
        reader.add_response(format!("{}/rail_name_0", dir), "GPU\n");
        reader.add_response(format!("{}/in_power0_input", dir), "1200\n");
        reader.add_response(format!("{}/in_voltage0_input", dir), "19000\n");
        reader.add_response(format!("{}/in_current0_input", dir), "63\n");
        reader.add_response(format!("{}/rail_name_1", dir), "CPU\n");
        reader.add_response(format!("{}/in_power1_input", dir), "800\n");
        reader.add_response(format!("{}/rail_name_2", dir), "SOC\n");
        reader.add_response(format!("{}/in_power2_input", dir), "1000\n");

        let rails = Ina3221::new(reader).rails().await.unwrap();
        let names = rails.iter().map(|r| r.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["gpu", "cpu", "soc"]);
        assert_eq!(rails[0].millivolts, Some(19000.0));
        assert_eq!(rails[1].millivolts, None);
        assert_eq!(rails[2].milliwatts, 1000.0);
    }

    #[tokio::test]
    async fn test_no_power_monitor() {
        let ds = Ina3221::new(HardcodedReader::new());
        assert!(ds.rails().await.is_err());
    }
}
