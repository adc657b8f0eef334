use crate::datasource::{Reader, read_value};
use crate::domain::ReaderError;
use crate::metrics::temperature::{DataSource, Probe};
use std::collections::HashSet;

const PATH_THERMAL: &str = "/sys/devices/virtual/thermal";

// Offline Tegra zones report -256 C
const MIN_VALID_MILLI_CELSIUS: i64 = -100_000;

pub struct ThermalZones<R> {
    reader: R,
}

impl<R> ThermalZones<R>
where
    R: Reader,
{
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

/// `CPU-therm` -> `cpu`, `Tboard_tegra` -> `tboard`, `gpu-thermal` -> `gpu`,
/// `thermal-fan-est` -> `thermal`.
pub(crate) fn normalize_probe_name(raw: &str) -> String {
    let name = raw.trim().to_lowercase();
    if name.starts_with("thermal-fan-est") {
        return "thermal".to_owned();
    }

    for suffix in ["-therm", "_tegra", "-thermal"] {
        if let Some(stripped) = name.strip_suffix(suffix) {
            return stripped.to_owned();
        }
    }

    name
}

impl<R> DataSource for ThermalZones<R>
where
    R: Reader,
{
    #[allow(clippy::manual_async_fn)]
    fn probes(&self) -> impl Future<Output = Result<Vec<Probe>, ReaderError>> + Send {
        async move {
            let zones = self.reader.list_dir(PATH_THERMAL).await?;

            let mut seen = HashSet::new();
            let mut probes = vec![];

            for zone in zones.iter().filter(|z| z.starts_with("thermal_zone")) {
                let dir = format!("{}/{}", PATH_THERMAL, zone);
                let Ok(kind) = self.reader.read_to_string(format!("{}/type", dir)).await else {
                    continue;
                };

                let name = normalize_probe_name(&kind);
                let millis = match read_value::<_, i64>(&self.reader, format!("{}/temp", dir)).await {
                    Ok(millis) => millis,
                    Err(e) => {
                        tracing::trace!(%zone, %name, error = %e, "Skipping unreadable thermal zone");
                        continue;
                    }
                };

                if millis <= MIN_VALID_MILLI_CELSIUS || !seen.insert(name.clone()) {
                    continue;
                }

                probes.push(Probe {
                    name,
                    celsius: millis as f64 / 1000.0,
                });
            }

            Ok(probes)
        }
    }
}
