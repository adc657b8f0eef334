use crate::datasource::Reader;
use crate::domain::ReaderError;
use crate::metrics::memory_usage::{DataSource, MemoryStats, RamStats, SwapStats};
use std::collections::HashMap;

const PATH_MEM_INFO: &str = "/proc/meminfo";

pub struct MemoryUsage<R> {
    reader: R,
}

impl<R> MemoryUsage<R>
where
    R: Reader,
{
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

fn parse_line(line: &str) -> Option<(&str, u64)> {
    let Some((key, rest)) = line.split_once(':') else {
        tracing::debug!("Skipping invalid mem-info line: {}", line);
        return None;
    };

    let (value, unit) = match rest.trim().rsplit_once(' ') {
        None => (rest.trim(), ""),
        Some((value, unit)) => (value, unit),
    };

    let value = value.trim().parse::<u64>().ok()?;
    let value = match unit.trim() {
        "" => value,
        "kB" => value * 1024,
        "mB" | "MB" => value * 1024 * 1024,
        unit => {
            tracing::debug!(unit, "Invalid unit found in mem-info line: {}", line);
            return None;
        }
    };

    Some((key.trim(), value))
}

fn parse_mem_info(content: &str) -> Result<MemoryStats, ReaderError> {
    let fields = content.lines().filter_map(parse_line).collect::<HashMap<_, _>>();
    let field = |key: &str| fields.get(key).copied().unwrap_or(0);

    let Some(&total) = fields.get("MemTotal") else {
        return Err(ReaderError::parse("MemTotal is missing from /proc/meminfo"));
    };

    let free = field("MemFree");
    let cache = field("Cached") + field("SReclaimable");
    let used = total
        .saturating_sub(free)
        .saturating_sub(field("Buffers"))
        .saturating_sub(cache);

    // Tegra kernels report the memory shared with the GPU through nvmap
    let shared = fields
        .get("NvMapMemUsed")
        .copied()
        .unwrap_or_else(|| field("Shmem"));

    let swap_total = field("SwapTotal");
    let swap_free = field("SwapFree");

    Ok(MemoryStats {
        ram: RamStats {
            total,
            used,
            free,
            shared,
        },
        swap: SwapStats {
            total: swap_total,
            used: swap_total.saturating_sub(swap_free),
            free: swap_free,
        },
    })
}

impl<R> DataSource for MemoryUsage<R>
where
    R: Reader,
{
    #[allow(clippy::manual_async_fn)]
    fn memory(&self) -> impl Future<Output = Result<MemoryStats, ReaderError>> + Send {
        async move {
            let mem_info = self.reader.read_to_string(PATH_MEM_INFO).await?;
            parse_mem_info(&mem_info)
        }
    }
}
