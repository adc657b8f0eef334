use crate::datasource::Reader;
use std::path::PathBuf;

pub const PATH_HWMON: &str = "/sys/class/hwmon";

/// Finds the hwmon device directories whose `name` attribute satisfies `predicate`.
pub async fn find_devices<R, F>(reader: &R, predicate: F) -> Vec<PathBuf>
where
    R: Reader,
    F: Fn(&str) -> bool + Send,
{
    let entries = match reader.list_dir(PATH_HWMON).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!(error = %e, "No hwmon devices available");
            return vec![];
        }
    };

    let mut devices = vec![];
    for entry in entries {
        let dir = PathBuf::from(PATH_HWMON).join(&entry);
        let Ok(name) = reader.read_to_string(dir.join("name")).await else {
            continue;
        };

        if predicate(name.trim()) {
            devices.push(dir);
        }
    }

    devices
}
