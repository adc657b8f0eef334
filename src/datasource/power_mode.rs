use crate::datasource::Reader;
use crate::domain::ReaderError;
use crate::metrics::power_mode::{DataSource, PowerModeStats};

/// Reads the active nvpmodel mode and resolves its name from the nvpmodel configuration.
pub struct NvpModel<R> {
    reader: R,
    status_path: String,
    conf_path: String,
}

impl<R> NvpModel<R>
where
    R: Reader,
{
    pub fn new(reader: R, status_path: impl Into<String>, conf_path: impl Into<String>) -> Self {
        Self {
            reader,
            status_path: status_path.into(),
            conf_path: conf_path.into(),
        }
    }
}

/// The status file contains `pmode:0002` optionally followed by other `key:value` tokens.
fn parse_status(content: &str) -> Result<u32, ReaderError> {
    let mode = content
        .split_whitespace()
        .find_map(|token| token.strip_prefix("pmode:"))
        .ok_or_else(|| ReaderError::parse(format!("no pmode in nvpmodel status {:?}", content.trim())))?;

    Ok(mode.parse::<u32>()?)
}

/// Finds `< POWER_MODEL ID=2 NAME=MODE_15W_6CORE >` for the given id.
fn find_mode_name(conf: &str, id: u32) -> Option<String> {
    conf.lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix('<')?.strip_suffix('>'))
        .filter(|body| body.split_whitespace().next() == Some("POWER_MODEL"))
        .find_map(|body| {
            let mut mode_id = None;
            let mut name = None;

            for token in body.split_whitespace().skip(1) {
                match token.split_once('=') {
                    Some(("ID", value)) => mode_id = value.parse::<u32>().ok(),
                    Some(("NAME", value)) => name = Some(value.to_owned()),
                    _ => {}
                }
            }

            (mode_id == Some(id)).then_some(name).flatten()
        })
}

impl<R> DataSource for NvpModel<R>
where
    R: Reader,
{
    #[allow(clippy::manual_async_fn)]
    fn power_mode(&self) -> impl Future<Output = Result<PowerModeStats, ReaderError>> + Send {
        async move {
            let status = self.reader.read_to_string(&self.status_path).await?;
            let id = parse_status(&status)?;

            let name = match self.reader.read_to_string(&self.conf_path).await {
                Ok(conf) => find_mode_name(&conf, id),
                Err(e) => {
                    tracing::debug!(path = %self.conf_path, error = %e, "Cannot read nvpmodel configuration");
                    None
                }
            };

            Ok(PowerModeStats {
                id,
                name: name.unwrap_or_else(|| format!("MODE_{}", id)),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::tests::HardcodedReader;
    use crate::domain::ReaderErrorKind;

    const STATUS: &str = "/var/lib/nvpmodel/status";
    const CONF: &str = "/etc/nvpmodel.conf";

    const XAVIER_NX_CONF: &str = "\
< PARAM TYPE=FILE NAME=CPU_ONLINE >
CORE_0 /sys/devices/system/cpu/cpu0/online

< POWER_MODEL ID=0 NAME=MODE_15W_2CORE >
CPU_ONLINE CORE_0 1
< POWER_MODEL ID=1 NAME=MODE_15W_4CORE >
CPU_ONLINE CORE_0 1
< POWER_MODEL ID=2 NAME=MODE_15W_6CORE >
CPU_ONLINE CORE_0 1

< PM_CONFIG DEFAULT=2 >
";

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status("pmode:0002 fmode:quiet\n").unwrap(), 2);
        assert_eq!(parse_status("pmode:0000").unwrap(), 0);
        assert_eq!(
            parse_status("fmode:quiet").unwrap_err().kind(),
            ReaderErrorKind::ParseFailure
        );
    }

    #[test]
    fn test_find_mode_name() {
        assert_eq!(find_mode_name(XAVIER_NX_CONF, 2).as_deref(), Some("MODE_15W_6CORE"));
        assert_eq!(find_mode_name(XAVIER_NX_CONF, 0).as_deref(), Some("MODE_15W_2CORE"));
        assert_eq!(find_mode_name(XAVIER_NX_CONF, 7), None);
    }

    #[tokio::test]
    async fn test_power_mode() {
        let mut reader = HardcodedReader::new();
        reader.add_response(STATUS, "pmode:0001\n");
        reader.add_response(CONF, XAVIER_NX_CONF);

        let mode = NvpModel::new(reader, STATUS, CONF).power_mode().await.unwrap();
        assert_eq!(mode.id, 1);
        assert_eq!(mode.name, "MODE_15W_4CORE");
    }

    #[tokio::test]
    async fn test_power_mode_without_conf() {
        let mut reader = HardcodedReader::new();
        reader.add_response(STATUS, "pmode:0003\n");

        let mode = NvpModel::new(reader, STATUS, CONF).power_mode().await.unwrap();
        assert_eq!(mode.name, "MODE_3");
    }

    #[tokio::test]
    async fn test_power_mode_without_nvpmodel() {
        let ds = NvpModel::new(HardcodedReader::new(), STATUS, CONF);
        assert_eq!(
            ds.power_mode().await.unwrap_err().kind(),
            ReaderErrorKind::Unavailable
        );
    }
}
