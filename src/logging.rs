use crate::config::{Log, Rotation};
use std::error::Error;
use std::str::FromStr;
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, registry};

const LOG_FILE_PREFIX: &str = "jetson-exporter";

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync>;

/// Installs the global subscriber. The returned guard must be kept alive for
/// the lifetime of the process, otherwise buffered file output is lost.
pub fn setup_logging(cfg: &Log) -> Result<Option<WorkerGuard>, Box<dyn Error + Send + Sync>> {
    let filter = construct_env_filter(cfg);
    let stdout_layer = cfg
        .enable_stdout
        .then(|| compact_layer(std::io::stdout, true));
    let (file_layer, guard) = construct_log_file_layer(cfg)?.unzip();

    Registry::default()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}

fn construct_env_filter(cfg: &Log) -> EnvFilter {
    let default_level = LevelFilter::from_str(&cfg.level).unwrap_or_else(|_| {
        eprintln!("Unknown log level '{}', falling back to INFO", cfg.level);
        LevelFilter::INFO
    });

    let mut filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    for directive in &cfg.directives {
        match directive.parse() {
            Ok(directive) => filter = filter.add_directive(directive),
            Err(e) => eprintln!("Skipping invalid log directive '{}': {}", directive, e),
        }
    }

    filter
}

fn compact_layer<S, W>(writer: W, ansi: bool) -> BoxedLayer<S>
where
    S: Subscriber + for<'a> registry::LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(true)
        .with_line_number(true)
        .with_level(true)
        .with_span_events(FmtSpan::NONE)
        .compact()
        .boxed()
}

fn rolling_rotation(rotation: Rotation) -> tracing_appender::rolling::Rotation {
    match rotation {
        Rotation::Daily => tracing_appender::rolling::Rotation::DAILY,
        Rotation::Hourly => tracing_appender::rolling::Rotation::HOURLY,
        Rotation::Never => tracing_appender::rolling::Rotation::NEVER,
    }
}

fn construct_log_file_layer<S>(
    cfg: &Log,
) -> Result<Option<(BoxedLayer<S>, WorkerGuard)>, Box<dyn Error + Send + Sync>>
where
    S: Subscriber + for<'a> registry::LookupSpan<'a>,
{
    if !cfg.enable_log_file {
        return Ok(None);
    }

    let Some(directory) = &cfg.log_file_directory else {
        eprintln!("No log file directory specified. Skipping log file configuration.");
        return Ok(None);
    };

    let file_appender = RollingFileAppender::builder()
        .rotation(rolling_rotation(cfg.rotation))
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .max_log_files(cfg.max_log_files)
        .build(directory)
        .map_err(|e| {
            format!(
                "Failed to create file appender for directory [{}]. Error=[{}]",
                directory, e
            )
        })?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    Ok(Some((compact_layer(non_blocking, false), guard)))
}
