use crate::domain::{BoardIdentity, BoardInfo, MetricPoint, ReaderError};
use crate::metrics::BOARD_INFO;

const UNKNOWN: &str = "unknown";

/// Module part number prefix to the L4T board codename.
const CODENAMES: &[(&str, &str)] = &[
    ("p2771", "quill"),
    ("p3310", "quill"),
    ("p3448", "porg"),
    ("p3489", "lanai"),
    ("p2888", "galen"),
    ("p3668", "jakku"),
    ("p3701", "concord"),
];

/// L4T release to the JetPack release that shipped it.
const JETPACK_RELEASES: &[(&str, &str)] = &[
    ("32.3.1", "4.3"),
    ("32.4.3", "4.4"),
    ("32.4.4", "4.4.1"),
    ("32.5.0", "4.5"),
    ("32.5.1", "4.5.1"),
    ("32.6.1", "4.6"),
    ("32.7.1", "4.6.1"),
    ("32.7.2", "4.6.2"),
    ("32.7.3", "4.6.3"),
    ("32.7.4", "4.6.4"),
    ("35.1.0", "5.0.2"),
    ("35.2.1", "5.1"),
    ("35.3.1", "5.1.1"),
    ("35.4.1", "5.1.2"),
    ("36.3.0", "6.0"),
    ("36.4.0", "6.1"),
];

/// Raw identity facts as found on the host. Missing facts stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardFacts {
    pub l4t: Option<String>,
    pub model: Option<String>,
    /// Device-tree `compatible` entries, most specific first.
    pub compatible: Vec<String>,
    pub serial_number: Option<String>,
    pub distribution: Option<String>,
    pub kernel_release: Option<String>,
    pub machine: String,
}

pub trait DataSource {
    fn board(&self) -> impl Future<Output = Result<BoardFacts, ReaderError>> + Send;
}

pub fn codename(compatible: &[String]) -> Option<&'static str> {
    compatible.iter().find_map(|entry| {
        CODENAMES
            .iter()
            .find(|(part, _)| entry.contains(part))
            .map(|(_, codename)| *codename)
    })
}

pub fn jetpack(l4t: &str) -> Option<&'static str> {
    JETPACK_RELEASES
        .iter()
        .find(|(release, _)| *release == l4t)
        .map(|(_, jetpack)| *jetpack)
}

/// Derives the published [`BoardInfo`] from the raw host facts.
pub struct Board<T> {
    data_source: T,
}

impl<T> Board<T>
where
    T: DataSource,
{
    pub fn new(data_source: T) -> Self {
        Self { data_source }
    }
}

fn or_unknown(value: Option<&str>) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or(UNKNOWN)
        .to_owned()
}

impl From<BoardFacts> for BoardInfo {
    fn from(facts: BoardFacts) -> Self {
        let soc = facts
            .compatible
            .last()
            .map(|c| c.strip_prefix("nvidia,").unwrap_or(c));

        Self {
            codename: or_unknown(codename(&facts.compatible)),
            jetpack: or_unknown(facts.l4t.as_deref().and_then(jetpack)),
            l4t: or_unknown(facts.l4t.as_deref()),
            distribution: or_unknown(facts.distribution.as_deref()),
            machine: or_unknown(Some(facts.machine.as_str())),
            release: or_unknown(facts.kernel_release.as_deref()),
            module: or_unknown(facts.model.as_deref()),
            soc: or_unknown(soc),
            serial_number: or_unknown(facts.serial_number.as_deref()),
        }
    }
}

#[async_trait::async_trait]
impl<T> BoardIdentity for Board<T>
where
    T: DataSource + Send + Sync + 'static,
{
    async fn board_info(&self) -> Result<BoardInfo, ReaderError> {
        let facts = self.data_source.board().await?;
        Ok(BoardInfo::from(facts))
    }
}

/// The info-style point: all identity facts as labels, value fixed at 1.
pub fn board_info_point(info: &BoardInfo) -> MetricPoint {
    let mut labels = Vec::with_capacity(10);
    labels.push(("board_info", "info"));
    labels.extend(info.labels());

    MetricPoint::gauge(BOARD_INFO, &labels, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xavier_nx() -> BoardFacts {
        BoardFacts {
            l4t: Some("32.4.3".to_owned()),
            model: Some("NVIDIA Jetson Xavier NX Developer Kit".to_owned()),
            compatible: vec![
                "nvidia,p3509-0000+p3668-0001".to_owned(),
                "nvidia,jetson-xavier-nx".to_owned(),
                "nvidia,tegra194".to_owned(),
            ],
            serial_number: Some("1422919123456".to_owned()),
            distribution: Some("Ubuntu 18.04.5 LTS".to_owned()),
            kernel_release: Some("4.9.140-tegra".to_owned()),
            machine: "aarch64".to_owned(),
        }
    }

    #[test]
    fn test_board_info_from_facts() {
        let info = BoardInfo::from(xavier_nx());

        assert_eq!(info.codename, "jakku");
        assert_eq!(info.l4t, "32.4.3");
        assert_eq!(info.jetpack, "4.4");
        assert_eq!(info.soc, "tegra194");
        assert_eq!(info.module, "NVIDIA Jetson Xavier NX Developer Kit");
        assert_eq!(info.release, "4.9.140-tegra");
    }

    #[test]
    fn test_missing_facts_are_unknown() {
        let info = BoardInfo::from(BoardFacts {
            machine: "x86_64".to_owned(),
            ..Default::default()
        });

        assert_eq!(info.codename, "unknown");
        assert_eq!(info.jetpack, "unknown");
        assert_eq!(info.soc, "unknown");
        assert_eq!(info.machine, "x86_64");
    }

    #[test]
    fn test_board_info_point() {
        let point = board_info_point(&BoardInfo::from(xavier_nx()));

        assert_eq!(point.name, BOARD_INFO);
        assert_eq!(point.value, 1.0);
        assert_eq!(point.label("board_info"), Some("info"));
        assert_eq!(point.label("codename"), Some("jakku"));
        assert_eq!(point.label("jetpack"), Some("4.4"));
        assert_eq!(point.labels.len(), 10);
    }

    #[test]
    fn test_jetpack_lookup() {
        assert_eq!(jetpack("32.7.1"), Some("4.6.1"));
        assert_eq!(jetpack("35.3.1"), Some("5.1.1"));
        assert_eq!(jetpack("31.1.0"), None);
    }
}
