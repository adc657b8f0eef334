use crate::datasource::Reader;
use crate::domain::ReaderError;
use crate::metrics::uptime::DataSource;
use std::time::Duration;

const PATH_PROC_UPTIME: &str = "/proc/uptime";

pub struct ProcUptime<R> {
    reader: R,
}

impl<R> ProcUptime<R>
where
    R: Reader,
{
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

/// `/proc/uptime` holds the seconds since boot followed by the aggregate idle time.
fn parse_uptime(content: &str) -> Result<Duration, ReaderError> {
    let seconds = content
        .split_whitespace()
        .next()
        .ok_or_else(|| ReaderError::parse("empty /proc/uptime"))?
        .parse::<f64>()?;

    Duration::try_from_secs_f64(seconds)
        .map_err(|e| ReaderError::parse(format!("invalid uptime {}: {}", seconds, e)))
}

impl<R> DataSource for ProcUptime<R>
where
    R: Reader,
{
    #[allow(clippy::manual_async_fn)]
    fn uptime(&self) -> impl Future<Output = Result<Duration, ReaderError>> + Send {
        async move {
            let content = self.reader.read_to_string(PATH_PROC_UPTIME).await?;
            parse_uptime(&content)
        }
    }
}
