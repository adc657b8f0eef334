use num_traits::ToPrimitive;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::num::{ParseFloatError, ParseIntError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub type Labels = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Gauge,
    Counter,
}

/// A single named, labeled reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricPoint {
    pub name: String,
    pub labels: Labels,
    pub value: f64,
    pub kind: MetricKind,
}

impl MetricPoint {
    pub fn gauge<T: ToPrimitive>(name: &str, labels: &[(&str, &str)], value: T) -> Self {
        Self::new(name, labels, value, MetricKind::Gauge)
    }

    pub fn counter<T: ToPrimitive>(name: &str, labels: &[(&str, &str)], value: T) -> Self {
        Self::new(name, labels, value, MetricKind::Counter)
    }

    fn new<T: ToPrimitive>(name: &str, labels: &[(&str, &str)], value: T, kind: MetricKind) -> Self {
        Self {
            name: name.to_owned(),
            labels: labels
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
            value: value.to_f64().unwrap_or(f64::NAN),
            kind,
        }
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

/// An immutable point-in-time collection of readings.
///
/// Construction enforces that every (name, labels) pair is unique: the first
/// occurrence wins and later duplicates are dropped.
#[derive(Debug, Clone)]
pub struct Snapshot {
    sequence: u64,
    timestamp: SystemTime,
    points: Vec<MetricPoint>,
}

impl Snapshot {
    pub fn new(sequence: u64, points: Vec<MetricPoint>) -> Self {
        let mut seen = HashSet::with_capacity(points.len());
        let mut unique = Vec::with_capacity(points.len());

        for point in points {
            if seen.insert((point.name.clone(), point.labels.clone())) {
                unique.push(point);
            } else {
                tracing::warn!(
                    name = %point.name,
                    labels = ?point.labels,
                    "Dropping duplicate metric point"
                );
            }
        }

        Self {
            sequence,
            timestamp: SystemTime::now(),
            points: unique,
        }
    }

    pub fn empty() -> Self {
        Self {
            sequence: 0,
            timestamp: SystemTime::now(),
            points: vec![],
        }
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    pub fn points(&self) -> &[MetricPoint] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn find(&self, name: &str, label: (&str, &str)) -> Option<&MetricPoint> {
        self.points
            .iter()
            .find(|p| p.name == name && p.label(label.0) == Some(label.1))
    }
}

/// Slow-changing board identity, exposed as an info-style metric.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize)]
pub struct BoardInfo {
    pub codename: String,
    pub l4t: String,
    pub distribution: String,
    pub jetpack: String,
    pub machine: String,
    pub release: String,
    pub module: String,
    pub soc: String,
    pub serial_number: String,
}

impl BoardInfo {
    pub fn labels(&self) -> [(&'static str, &str); 9] {
        [
            ("codename", &self.codename),
            ("l4t", &self.l4t),
            ("distribution", &self.distribution),
            ("jetpack", &self.jetpack),
            ("machine", &self.machine),
            ("release", &self.release),
            ("module", &self.module),
            ("soc", &self.soc),
            ("serial_number", &self.serial_number),
        ]
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ReaderErrorKind {
    Unavailable,
    Timeout,
    ParseFailure,
}

impl ReaderErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unavailable => "unavailable",
            Self::Timeout => "timeout",
            Self::ParseFailure => "parse_failure",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    #[error("sensor unavailable: {0}")]
    Unavailable(String),

    #[error("sensor did not respond within {0:?}")]
    Timeout(Duration),

    #[error("failed to parse sensor data: {0}")]
    ParseFailure(String),
}

impl ReaderError {
    pub fn kind(&self) -> ReaderErrorKind {
        match self {
            Self::Unavailable(_) => ReaderErrorKind::Unavailable,
            Self::Timeout(_) => ReaderErrorKind::Timeout,
            Self::ParseFailure(_) => ReaderErrorKind::ParseFailure,
        }
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseFailure(msg.into())
    }
}

impl From<std::io::Error> for ReaderError {
    fn from(error: std::io::Error) -> Self {
        Self::Unavailable(error.to_string())
    }
}

impl From<ParseIntError> for ReaderError {
    fn from(error: ParseIntError) -> Self {
        Self::ParseFailure(error.to_string())
    }
}

impl From<ParseFloatError> for ReaderError {
    fn from(error: ParseFloatError) -> Self {
        Self::ParseFailure(error.to_string())
    }
}

pub type ReaderResult = Result<Vec<MetricPoint>, ReaderError>;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum CycleOutcome {
    Complete,
    PartialFailure,
    TotalFailure,
    Overrun,
}

impl CycleOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::PartialFailure => "partial_failure",
            Self::TotalFailure => "total_failure",
            Self::Overrun => "overrun",
        }
    }
}

/// Samples one hardware domain into metric points.
#[async_trait::async_trait]
pub trait Sensor: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn enabled(&self) -> bool;

    /// Whether the host exposes this domain at all. Probed once at startup.
    async fn supported(&self) -> bool;

    async fn sample(&self) -> ReaderResult;
}

#[async_trait::async_trait]
pub trait BoardIdentity: Send + Sync + 'static {
    async fn board_info(&self) -> Result<BoardInfo, ReaderError>;
}
