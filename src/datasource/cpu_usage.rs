use crate::datasource::Reader;
use crate::domain::ReaderError;
use crate::metrics::cpu_usage::{CoreUsageStats, CpuUsageStats, DataSource};
use std::collections::BTreeMap;
use std::sync::Mutex;
use tokio::time::{Duration, Instant};

const PATH_PROC_STAT: &str = "/proc/stat";
const MIN_TIME_BETWEEN_MEASUREMENTS: Duration = Duration::from_millis(250);

const CPU_IDLE: usize = 3;
const CPU_IOWAIT: usize = 4;
const CPU_STATS_COUNT: usize = 10;

// Guest and Guest_Nice are already accounted for in User and Nice.
const CPU_TOTAL_COLUMNS: usize = 8;

type Jiffies = [u64; CPU_STATS_COUNT];

/// Per-core jiffies keyed by kernel core index.
#[derive(Debug, Clone, Default, PartialEq)]
struct Measurement {
    cores: BTreeMap<usize, Jiffies>,
}

pub struct CpuUsage<R> {
    reader: R,
    measurement: Mutex<Option<(Instant, Measurement)>>,
}

impl<R> CpuUsage<R>
where
    R: Reader,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            measurement: Mutex::new(None),
        }
    }

    fn previous(&self) -> Option<(Instant, Measurement)> {
        self.measurement
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn store(&self, timestamp: Instant, measurement: Measurement) {
        let mut guard = self.measurement.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some((timestamp, measurement));
    }
}

impl<R> DataSource for CpuUsage<R>
where
    R: Reader,
{
    #[allow(clippy::manual_async_fn)]
    fn cpu_usage(&self) -> impl Future<Output = Result<CpuUsageStats, ReaderError>> + Send {
        async move {
            let (timestamp, previous) = match self.previous() {
                Some(previous) => previous,
                None => (Instant::now(), make_measurement(&self.reader).await?),
            };

            let time_since_measurement = timestamp.elapsed();
            if time_since_measurement < MIN_TIME_BETWEEN_MEASUREMENTS {
                tokio::time::sleep(MIN_TIME_BETWEEN_MEASUREMENTS - time_since_measurement).await;
            }

            let current = make_measurement(&self.reader).await?;
            let stats = calculate_stats(&previous, &current);
            self.store(Instant::now(), current);

            Ok(stats)
        }
    }
}

async fn make_measurement<R: Reader>(reader: &R) -> Result<Measurement, ReaderError> {
    let content = reader.read_to_string(PATH_PROC_STAT).await?;
    parse_proc_stat(&content)
}

fn parse_proc_stat(content: &str) -> Result<Measurement, ReaderError> {
    let mut measurement = Measurement::default();
    let mut has_total = false;

    for line in content.lines().filter(|l| l.starts_with("cpu")) {
        let mut parts = line.split_whitespace();
        let Some(label) = parts.next() else {
            continue;
        };

        let mut vals = [0u64; CPU_STATS_COUNT];
        for (idx, part) in parts.take(CPU_STATS_COUNT).enumerate() {
            vals[idx] = part.parse::<u64>()?;
        }

        match label.strip_prefix("cpu") {
            Some("") => has_total = true,
            Some(core) => {
                let core = core.parse::<usize>()?;
                measurement.cores.insert(core, vals);
            }
            None => {}
        }
    }

    if !has_total {
        return Err(ReaderError::parse(
            "the aggregate cpu line is missing from /proc/stat",
        ));
    }

    Ok(measurement)
}

/// Cores present in only one of the measurements (hot-plugged) are left out.
fn calculate_stats(previous: &Measurement, current: &Measurement) -> CpuUsageStats {
    let cores = current
        .cores
        .iter()
        .filter_map(|(core, curr)| {
            previous.cores.get(core).map(|prev| CoreUsageStats {
                core: *core,
                usage: calculate_usage(curr, prev),
            })
        })
        .collect();

    CpuUsageStats { cores }
}

fn calculate_usage(curr: &Jiffies, prev: &Jiffies) -> f64 {
    let mut deltas = [0u64; CPU_STATS_COUNT];
    for i in 0..CPU_STATS_COUNT {
        deltas[i] = curr[i].saturating_sub(prev[i]);
    }

    let total_delta: u64 = deltas.iter().take(CPU_TOTAL_COLUMNS).sum();
    if total_delta == 0 {
        return 0.0;
    }

    let t = total_delta as f64;
    let idle = deltas[CPU_IDLE] as f64 / t;
    let iowait = deltas[CPU_IOWAIT] as f64 / t;

    (1.0 - idle - iowait).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::tests::HardcodedReader;

    #[test]
    fn test_parse_proc_stat_valid_input() {
        let content = r#"cpu  1100 200 300 400 500 600 700 800 900 1000
cpu0 600 100 150 200 250 300 350 400 450 500
cpu1 500 100 150 200 250 300 350 400 450 500
intr 123456 789
ctxt 987654
"#;

        let result = parse_proc_stat(content).unwrap();
        assert_eq!(result.cores.len(), 2);
        assert_eq!(result.cores[&0], [600, 100, 150, 200, 250, 300, 350, 400, 450, 500]);
        assert_eq!(result.cores[&1], [500, 100, 150, 200, 250, 300, 350, 400, 450, 500]);
    }

    #[test]
    fn test_parse_proc_stat_with_offline_cores() {
        // cpu1 and cpu2 are offline, the kernel omits their lines
        let content = r#"cpu  10 10 10 10 10 10 10 10 10 10
cpu0 20 20 20 20 20 20 20 20 20 20
cpu3 30 30 30 30 30 30 30 30 30 30

"#;

        let result = parse_proc_stat(content).unwrap();
        assert_eq!(result.cores.keys().copied().collect::<Vec<_>>(), vec![0, 3]);
        assert_eq!(result.cores[&3][0], 30);
    }

    #[test]
    fn test_parse_proc_stat_rejects_garbage() {
        assert!(parse_proc_stat("cpu  10 abc 10").is_err());
        assert!(parse_proc_stat("intr 1 2 3").is_err());
    }

    #[test]
    fn test_calculate_usage_standard_usage() {
        let prev = [0, 0, 0, 100, 0, 0, 0, 0, 0, 0];
        // added: 20 user, 10 system, 10 iowait, 60 idle
        let curr = [20, 0, 10, 160, 10, 0, 0, 0, 0, 0];

        let usage = calculate_usage(&curr, &prev);
        assert!((usage - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn test_calculate_usage_zero_delta() {
        let prev = [100; 10];
        assert_eq!(calculate_usage(&prev, &prev), 0.0);
    }

    #[test]
    fn test_calculate_usage_guest_overlap() {
        let prev = [0u64; 10];
        let curr = [10, 0, 0, 90, 0, 0, 0, 0, 5, 0];
        assert!((calculate_usage(&curr, &prev) - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn test_calculate_usage_saturating_sub() {
        assert_eq!(calculate_usage(&[100; 10], &[200; 10]), 0.0);
    }

    #[test]
    fn test_hotplugged_core_is_skipped() {
        let previous = parse_proc_stat("cpu  0 0 0 100 0 0 0 0 0 0\ncpu0 0 0 0 100 0 0 0 0 0 0\n").unwrap();
        let current = parse_proc_stat(
            "cpu  50 0 0 150 0 0 0 0 0 0\ncpu0 50 0 0 150 0 0 0 0 0 0\ncpu1 5 0 0 5 0 0 0 0 0 0\n",
        )
        .unwrap();

        let stats = calculate_stats(&previous, &current);
        assert_eq!(stats.cores.len(), 1);
        assert_eq!(stats.cores[0].core, 0);
        assert!((stats.cores[0].usage - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_cpu_usage_datasource() {
        // A -> B: 100 jiffies, 50 user, 50 idle => 50%
        let snapshot_a = "cpu  0 0 0 100 0 0 0 0 0 0\ncpu0 0 0 0 100 0 0 0 0 0 0\n";
        let snapshot_b = "cpu  50 0 0 150 0 0 0 0 0 0\ncpu0 50 0 0 150 0 0 0 0 0 0\n";
        // B -> C: 100 jiffies, 80 system, 20 idle => 80%
        let snapshot_c = "cpu  50 0 80 170 0 0 0 0 0 0\ncpu0 50 0 80 170 0 0 0 0 0 0\n";

        let mut reader = HardcodedReader::new();
        reader.add_response(PATH_PROC_STAT, snapshot_a);
        reader.add_response(PATH_PROC_STAT, snapshot_b);
        reader.add_response(PATH_PROC_STAT, snapshot_c);

        let datasource = CpuUsage::new(reader);
        tokio::time::pause();

        let first = datasource.cpu_usage().await.unwrap();
        assert!((first.cores[0].usage - 0.5).abs() < f64::EPSILON);
        assert_eq!(first.cores.len(), 1);

        tokio::time::advance(Duration::from_millis(300)).await;

        let second = datasource.cpu_usage().await.unwrap();
        assert!((second.cores[0].usage - 0.8).abs() < f64::EPSILON);
    }
}
