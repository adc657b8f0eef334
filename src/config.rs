use crate::metrics;
use config::Config;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const CONFIG_FILE_NAME: &str = "jetson-exporter";
const ENV_PREFIX: &str = "JETSON_EXPORTER";
const PRINT_CONFIG_FLAG: &str = "--print-config";

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rotation {
    Daily,
    Hourly,
    Never,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Log {
    pub enable_stdout: bool,
    pub enable_log_file: bool,
    pub log_file_directory: Option<String>,
    pub level: String,
    pub directives: Vec<String>,
    pub max_log_files: usize,
    pub rotation: Rotation,
}

impl Default for Log {
    fn default() -> Self {
        Self {
            enable_stdout: true,
            enable_log_file: false,
            log_file_directory: Some("/var/log/jetson-exporter/".to_owned()),
            level: "INFO".to_owned(),
            directives: vec![],
            max_log_files: 7,
            rotation: Rotation::Daily,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Http {
    pub address: String,
    pub port: u16,
    /// Request timeout in milliseconds.
    pub timeout: u64,
}

impl Default for Http {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_owned(),
            port: 8000,
            timeout: Duration::from_secs(10).as_millis() as u64,
        }
    }
}

/// Sampling schedule. All durations are in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Sampling {
    pub interval: u64,
    pub reader_timeout: u64,
    /// The cycle deadline is `interval - deadline_margin`.
    pub deadline_margin: u64,
    /// Consecutive failed cycles after which the exporter reports itself as down.
    pub stale_after: u64,
    /// How often board identity is re-read. 0 reads it only at startup.
    pub board_info_refresh: u64,
}

impl Default for Sampling {
    fn default() -> Self {
        Self {
            interval: 5000,
            reader_timeout: 2000,
            deadline_margin: 500,
            stale_after: 3,
            board_info_refresh: Duration::from_secs(3600).as_millis() as u64,
        }
    }
}

impl Sampling {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval)
    }

    pub fn reader_timeout(&self) -> Duration {
        Duration::from_millis(self.reader_timeout)
    }

    pub fn deadline(&self) -> Duration {
        match self.interval.checked_sub(self.deadline_margin) {
            Some(deadline) if deadline > 0 => Duration::from_millis(deadline),
            _ => self.interval(),
        }
    }

    pub fn board_info_refresh(&self) -> Option<Duration> {
        (self.board_info_refresh > 0).then(|| Duration::from_millis(self.board_info_refresh))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Sensors {
    pub cpu_usage: metrics::cpu_usage::Config,
    pub cpu_frequency: metrics::cpu_frequency::Config,
    pub gpu: metrics::gpu::Config,
    pub memory: metrics::memory_usage::Config,
    pub disk: metrics::disk::Config,
    pub fan: metrics::fan::Config,
    pub temperature: metrics::temperature::Config,
    pub power: metrics::power::Config,
    pub power_mode: metrics::power_mode::Config,
    pub uptime: metrics::uptime::Config,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default = "Log::default")]
    pub log: Log,

    #[serde(default = "Http::default")]
    pub http: Http,

    #[serde(default = "Sampling::default")]
    pub sampling: Sampling,

    #[serde(default = "Sensors::default")]
    pub sensors: Sensors,
}

impl Configuration {
    pub fn load(base_path: impl AsRef<Path>) -> Result<Self, config::ConfigError> {
        let base_path = base_path.as_ref();

        let cfg = Config::builder()
            .add_source(
                config::File::from(base_path.join(format!("{}.toml", CONFIG_FILE_NAME)))
                    .format(config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                config::File::from(base_path.join(format!("{}.json", CONFIG_FILE_NAME)))
                    .format(config::FileFormat::Json)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("log.directives")
                    .with_list_parse_key("sensors.gpu.load_paths")
                    .with_list_parse_key("sensors.temperature.ignored_probes"),
            )
            .build()?;

        let configuration: Self = cfg.try_deserialize()?;
        configuration.validate()?;

        Ok(configuration)
    }

    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.sampling.interval == 0 {
            return Err(config::ConfigError::Message(
                "sampling.interval must be greater than 0".to_owned(),
            ));
        }

        if self.sampling.reader_timeout == 0 {
            return Err(config::ConfigError::Message(
                "sampling.reader_timeout must be greater than 0".to_owned(),
            ));
        }

        Ok(())
    }
}

/// The first argument that is not a flag, `./` by default.
pub fn get_config_base_path(args: impl Iterator<Item = String>) -> String {
    args.skip(1)
        .find(|arg| !arg.starts_with("--"))
        .unwrap_or_else(|| "./".to_owned())
}

pub fn should_print_config_and_exit(mut args: impl Iterator<Item = String>) -> bool {
    args.any(|arg| arg == PRINT_CONFIG_FLAG)
}

pub fn print_config(configuration: &Configuration) -> Result<(), toml::ser::Error> {
    println!("{}", toml::to_string_pretty(configuration)?);
    Ok(())
}
