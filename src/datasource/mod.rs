use crate::domain::ReaderError;
use std::path::Path;

pub mod board;
pub mod cpu_frequency;
pub mod cpu_usage;
pub mod disk;
pub mod fan;
pub mod gpu;
pub mod hwmon;
pub mod memory_usage;
pub mod power;
pub mod power_mode;
pub mod thermal;
pub mod uptime;

/// Access to host-local sensor files (procfs, sysfs, device-tree).
pub trait Reader: Send + Sync {
    fn read_to_string(
        &self,
        path: impl AsRef<Path> + Send,
    ) -> impl Future<Output = std::io::Result<String>> + Send;

    /// Names of the entries in a directory, sorted.
    fn list_dir(
        &self,
        path: impl AsRef<Path> + Send,
    ) -> impl Future<Output = std::io::Result<Vec<String>>> + Send;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioReader {}

impl TokioReader {
    pub fn new() -> Self {
        Self {}
    }
}

impl Reader for TokioReader {
    fn read_to_string(
        &self,
        path: impl AsRef<Path> + Send,
    ) -> impl Future<Output = std::io::Result<String>> + Send {
        async move { tokio::fs::read_to_string(path).await }
    }

    fn list_dir(
        &self,
        path: impl AsRef<Path> + Send,
    ) -> impl Future<Output = std::io::Result<Vec<String>>> + Send {
        async move {
            let mut entries = tokio::fs::read_dir(path).await?;
            let mut names = Vec::new();

            while let Some(entry) = entries.next_entry().await? {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }

            names.sort();
            Ok(names)
        }
    }
}

/// Reads a single numeric value from a sysfs attribute file.
pub(crate) async fn read_value<R, T>(
    reader: &R,
    path: impl AsRef<Path> + Send,
) -> Result<T, ReaderError>
where
    R: Reader,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let path = path.as_ref();
    let content = reader
        .read_to_string(path)
        .await
        .map_err(|e| ReaderError::unavailable(format!("{}: {}", path.display(), e)))?;

    content.trim().parse::<T>().map_err(|e| {
        ReaderError::parse(format!(
            "{}: invalid value {:?}: {}",
            path.display(),
            content.trim(),
            e
        ))
    })
}

/// Device-tree strings are NUL terminated.
pub(crate) fn trim_device_tree(content: &str) -> &str {
    content.trim_end_matches('\0').trim()
}
