use crate::domain::ReaderError;
use crate::metrics::disk::{DataSource, DiskStats};
use std::path::{Path, PathBuf};
use sysinfo::Disks;

/// Filesystem statistics for one mount point, queried through `sysinfo`.
pub struct MountedDisk {
    mount_point: PathBuf,
}

impl MountedDisk {
    pub fn new(mount_point: impl Into<PathBuf>) -> Self {
        Self {
            mount_point: mount_point.into(),
        }
    }
}

fn find_mount<'a, I>(mounts: I, mount_point: &Path) -> Option<DiskStats>
where
    I: IntoIterator<Item = (&'a Path, u64, u64)>,
{
    mounts
        .into_iter()
        .find(|(path, _, _)| *path == mount_point)
        .map(|(_, total, available)| DiskStats { total, available })
}

impl DataSource for MountedDisk {
    #[allow(clippy::manual_async_fn)]
    fn disk_space(&self) -> impl Future<Output = Result<DiskStats, ReaderError>> + Send {
        let mount_point = self.mount_point.clone();

        async move {
            tokio::task::spawn_blocking(move || {
                let disks = Disks::new_with_refreshed_list();
                let mounts = disks
                    .list()
                    .iter()
                    .map(|d| (d.mount_point(), d.total_space(), d.available_space()));

                find_mount(mounts, &mount_point).ok_or_else(|| {
                    ReaderError::unavailable(format!(
                        "no filesystem is mounted at {}",
                        mount_point.display()
                    ))
                })
            })
            .await
            .map_err(|e| ReaderError::unavailable(format!("disk query task failed: {}", e)))?
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_mount_exact_match() {
        let mounts = vec![
            (Path::new("/boot/efi"), 60, 50),
            (Path::new("/"), 30_000, 12_000),
            (Path::new("/data"), 1_000, 10),
        ];

        let stats = find_mount(mounts.clone(), Path::new("/")).unwrap();
        assert_eq!(
            stats,
            DiskStats {
                total: 30_000,
                available: 12_000
            }
        );

        assert!(find_mount(mounts, Path::new("/mnt")).is_none());
    }
}
