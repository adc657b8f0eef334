use crate::datasource::{Reader, read_value};
use crate::domain::ReaderError;
use crate::metrics::cpu_frequency::{CpuFreqStats, DataSource};

const PATH_CPU_DEVICES: &str = "/sys/devices/system/cpu";

pub struct CpuFrequency<R> {
    reader: R,
}

impl<R> CpuFrequency<R>
where
    R: Reader,
{
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

fn core_index(entry: &str) -> Option<usize> {
    entry.strip_prefix("cpu")?.parse().ok()
}

impl<R> DataSource for CpuFrequency<R>
where
    R: Reader,
{
    #[allow(clippy::manual_async_fn)]
    fn cpu_freq(&self) -> impl Future<Output = Result<CpuFreqStats, ReaderError>> + Send {
        async move {
            let mut cores = self
                .reader
                .list_dir(PATH_CPU_DEVICES)
                .await?
                .iter()
                .filter_map(|entry| core_index(entry))
                .collect::<Vec<_>>();
            cores.sort_unstable();

            let mut core_freq = Vec::with_capacity(cores.len());
            for core in cores {
                let path = format!("{}/cpu{}/cpufreq/scaling_cur_freq", PATH_CPU_DEVICES, core);

                // offline cores have no readable cpufreq policy
                match read_value::<_, u64>(&self.reader, &path).await {
                    Ok(khz) => core_freq.push((core, khz * 1000)),
                    Err(e) => tracing::trace!(core, error = %e, "Skipping CPU core frequency"),
                }
            }

            if core_freq.is_empty() {
                return Err(ReaderError::unavailable("No CPU frequency sensors found"));
            }

            Ok(CpuFreqStats { cores: core_freq })
        }
    }
}
