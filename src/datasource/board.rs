use crate::datasource::{Reader, trim_device_tree};
use crate::domain::ReaderError;
use crate::metrics::board_info::{BoardFacts, DataSource};

const PATH_TEGRA_RELEASE: &str = "/etc/nv_tegra_release";
const PATH_MODEL: &str = "/proc/device-tree/model";
const PATH_COMPATIBLE: &str = "/proc/device-tree/compatible";
const PATH_SERIAL_NUMBER: &str = "/proc/device-tree/serial-number";
const PATH_OS_RELEASE: &str = "/etc/os-release";
const PATH_KERNEL_RELEASE: &str = "/proc/sys/kernel/osrelease";

pub struct HostBoard<R> {
    reader: R,
}

impl<R> HostBoard<R>
where
    R: Reader,
{
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    async fn read_optional(&self, path: &str) -> Option<String> {
        match self.reader.read_to_string(path).await {
            Ok(content) => Some(content),
            Err(e) => {
                tracing::debug!(%path, error = %e, "Board identity source not available");
                None
            }
        }
    }
}

/// `# R32 (release), REVISION: 4.3, GCID: ...` -> `32.4.3`
fn parse_tegra_release(content: &str) -> Option<String> {
    let line = content.lines().next()?;
    let major = line
        .trim_start_matches('#')
        .trim()
        .strip_prefix('R')?
        .split_whitespace()
        .next()?;

    let revision = line
        .split(',')
        .find_map(|part| part.trim().strip_prefix("REVISION:"))?
        .trim();

    Some(format!("{}.{}", major, revision))
}

fn parse_pretty_name(content: &str) -> Option<String> {
    content
        .lines()
        .find_map(|line| line.strip_prefix("PRETTY_NAME="))
        .map(|value| value.trim().trim_matches('"').to_owned())
}

fn parse_compatible(content: &str) -> Vec<String> {
    content
        .split('\0')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_owned)
        .collect()
}

impl<R> DataSource for HostBoard<R>
where
    R: Reader,
{
    #[allow(clippy::manual_async_fn)]
    fn board(&self) -> impl Future<Output = Result<BoardFacts, ReaderError>> + Send {
        async move {
            let model = self.read_optional(PATH_MODEL).await;
            let l4t = self.read_optional(PATH_TEGRA_RELEASE).await;

            // Without either marker this is not a Tegra host
            if model.is_none() && l4t.is_none() {
                return Err(ReaderError::unavailable("no device-tree model or L4T release found"));
            }

            let compatible = self.read_optional(PATH_COMPATIBLE).await;
            let serial_number = self.read_optional(PATH_SERIAL_NUMBER).await;
            let os_release = self.read_optional(PATH_OS_RELEASE).await;
            let kernel_release = self.read_optional(PATH_KERNEL_RELEASE).await;

            Ok(BoardFacts {
                l4t: l4t.as_deref().and_then(parse_tegra_release),
                model: model.as_deref().map(trim_device_tree).map(str::to_owned),
                compatible: compatible.as_deref().map(parse_compatible).unwrap_or_default(),
                serial_number: serial_number
                    .as_deref()
                    .map(trim_device_tree)
                    .map(str::to_owned),
                distribution: os_release.as_deref().and_then(parse_pretty_name),
                kernel_release: kernel_release.map(|r| r.trim().to_owned()),
                machine: std::env::consts::ARCH.to_owned(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BoardInfo, ReaderErrorKind};

    use crate::datasource::tests::HardcodedReader;

    #[test]
    fn test_parse_tegra_release() {
        let content = "# R32 (release), REVISION: 4.3, GCID: 21589087, BOARD: t186ref, EABI: aarch64, DATE: Fri Jun 26 04:34:27 UTC 2020\n";
        assert_eq!(parse_tegra_release(content).as_deref(), Some("32.4.3"));

        let content = "# R35 (release), REVISION: 3.1, GCID: 32827747, BOARD: t186ref, EABI: aarch64, DATE: Sun Mar 19 15:19:21 UTC 2023\n";
        assert_eq!(parse_tegra_release(content).as_deref(), Some("35.3.1"));

        assert_eq!(parse_tegra_release("garbage"), None);
    }

    #[test]
    fn test_parse_pretty_name() {
        let content = "NAME=\"Ubuntu\"\nVERSION=\"18.04.5 LTS (Bionic Beaver)\"\nPRETTY_NAME=\"Ubuntu 18.04.5 LTS\"\n";
        assert_eq!(parse_pretty_name(content).as_deref(), Some("Ubuntu 18.04.5 LTS"));
    }

    #[tokio::test]
    async fn test_read_board() {
        let mut reader = HardcodedReader::new();
        reader.add_response(
            PATH_TEGRA_RELEASE,
            "# R32 (release), REVISION: 7.1, GCID: 29818004, BOARD: t210ref, EABI: aarch64, DATE: Sat Feb 19 17:05:08 UTC 2022\n",
        );
        reader.add_response(PATH_MODEL, "NVIDIA Jetson Nano Developer Kit\0");
        reader.add_response(PATH_COMPATIBLE, "nvidia,p3449-0000-b00+p3448-0000-b00\0nvidia,jetson-nano\0nvidia,tegra210\0");
        reader.add_response(PATH_SERIAL_NUMBER, "1423019012345\0");
        reader.add_response(PATH_OS_RELEASE, "PRETTY_NAME=\"Ubuntu 18.04.6 LTS\"\n");
        reader.add_response(PATH_KERNEL_RELEASE, "4.9.253-tegra\n");

        let facts = HostBoard::new(reader).board().await.unwrap();
        assert_eq!(facts.compatible.len(), 3);
        assert_eq!(facts.serial_number.as_deref(), Some("1423019012345"));

        let info = BoardInfo::from(facts);
        assert_eq!(info.codename, "porg");
        assert_eq!(info.l4t, "32.7.1");
        assert_eq!(info.jetpack, "4.6.1");
        assert_eq!(info.module, "NVIDIA Jetson Nano Developer Kit");
        assert_eq!(info.soc, "tegra210");
        assert_eq!(info.distribution, "Ubuntu 18.04.6 LTS");
        assert_eq!(info.release, "4.9.253-tegra");
    }

    #[tokio::test]
    async fn test_not_a_tegra_host() {
        let mut reader = HardcodedReader::new();
        reader.add_response(PATH_OS_RELEASE, "PRETTY_NAME=\"Debian GNU/Linux 12\"\n");

        let err = HostBoard::new(reader).board().await.unwrap_err();
        assert_eq!(err.kind(), ReaderErrorKind::Unavailable);
    }
}
