use crate::datasource::{Reader, read_value};
use crate::domain::ReaderError;
use crate::metrics::gpu::{DataSource, GpuStats};
use std::sync::Mutex;

/// Reads the Tegra GPU `load` attribute, reported in tenths of a percent.
pub struct GpuLoad<R> {
    reader: R,
    candidates: Vec<String>,
    resolved: Mutex<Option<String>>,
}

impl<R> GpuLoad<R>
where
    R: Reader,
{
    pub fn new(reader: R, candidates: Vec<String>) -> Self {
        Self {
            reader,
            candidates,
            resolved: Mutex::new(None),
        }
    }

    async fn read_load(&self, path: &str) -> Result<GpuStats, ReaderError> {
        let per_mille = read_value::<_, f64>(&self.reader, path).await?;
        Ok(GpuStats {
            load: per_mille / 10.0,
        })
    }
}

impl<R> DataSource for GpuLoad<R>
where
    R: Reader,
{
    #[allow(clippy::manual_async_fn)]
    fn gpu_load(&self) -> impl Future<Output = Result<GpuStats, ReaderError>> + Send {
        async move {
            let resolved = self
                .resolved
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone();

            if let Some(path) = resolved {
                return self.read_load(&path).await;
            }

            for path in &self.candidates {
                match self.read_load(path).await {
                    Ok(stats) => {
                        tracing::debug!(%path, "Using GPU load sensor");
                        *self.resolved.lock().unwrap_or_else(|e| e.into_inner()) =
                            Some(path.clone());
                        return Ok(stats);
                    }
                    Err(ReaderError::Unavailable(_)) => continue,
                    Err(e) => return Err(e),
                }
            }

            Err(ReaderError::unavailable(format!(
                "none of the GPU load sensors is readable: {:?}",
                self.candidates
            )))
        }
    }
}
