//! Exporter self-monitoring, registered natively in the Prometheus registry so
//! it stays visible even when sampling itself is failing.

use crate::domain::{CycleOutcome, ReaderErrorKind};
use prometheus::{Gauge, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::time::Duration;

#[derive(Clone)]
pub struct HealthMetrics {
    stale: IntGauge,
    up: IntGauge,
    skipped_cycles: IntCounter,
    cycles: IntCounterVec,
    reader_failures: IntCounterVec,
    sequence: IntGauge,
    cycle_duration: Gauge,
    stale_after: u64,
}

impl HealthMetrics {
    pub fn new(stale_after: u64) -> anyhow::Result<Self> {
        let up = IntGauge::new(
            "jetson_exporter_up",
            "Whether sampling produced data within the last stale_after cycles",
        )?;
        up.set(1);

        Ok(Self {
            stale: IntGauge::new(
                "jetson_exporter_stale",
                "Consecutive sampling cycles without a single successful reader",
            )?,
            up,
            skipped_cycles: IntCounter::new(
                "jetson_exporter_skipped_cycles",
                "Sampling ticks skipped because the previous cycle was still running",
            )?,
            cycles: IntCounterVec::new(
                Opts::new("jetson_exporter_cycles_total", "Completed sampling cycles by outcome"),
                &["outcome"],
            )?,
            reader_failures: IntCounterVec::new(
                Opts::new("jetson_exporter_reader_failures_total", "Failed reader invocations"),
                &["reader", "kind"],
            )?,
            sequence: IntGauge::new(
                "jetson_exporter_snapshot_sequence",
                "Sequence number of the currently published snapshot",
            )?,
            cycle_duration: Gauge::new(
                "jetson_exporter_cycle_duration_seconds",
                "Duration of the last sampling cycle",
            )?,
            stale_after,
        })
    }

    pub fn register(&self, registry: &Registry) -> anyhow::Result<()> {
        registry.register(Box::new(self.stale.clone()))?;
        registry.register(Box::new(self.up.clone()))?;
        registry.register(Box::new(self.skipped_cycles.clone()))?;
        registry.register(Box::new(self.cycles.clone()))?;
        registry.register(Box::new(self.reader_failures.clone()))?;
        registry.register(Box::new(self.sequence.clone()))?;
        registry.register(Box::new(self.cycle_duration.clone()))?;
        Ok(())
    }

    pub fn record_reader_failure(&self, reader: &str, kind: ReaderErrorKind) {
        self.reader_failures
            .with_label_values(&[reader, kind.as_str()])
            .inc();
    }

    pub fn record_skipped_cycle(&self) {
        self.skipped_cycles.inc();
    }

    /// Updates the cycle counters and the staleness state. `succeeded` is the
    /// number of readers that returned data in this cycle.
    pub fn record_cycle(&self, outcome: CycleOutcome, succeeded: usize, duration: Duration) {
        self.cycles.with_label_values(&[outcome.as_str()]).inc();
        self.cycle_duration.set(duration.as_secs_f64());

        if succeeded > 0 {
            if self.stale.get() > 0 {
                tracing::info!(stale_cycles = self.stale.get(), "Sampling recovered");
            }
            self.stale.set(0);
        } else {
            self.stale.inc();
        }

        let stale = self.stale.get() as u64;
        let up = if self.stale_after > 0 && stale >= self.stale_after {
            0
        } else {
            1
        };

        if up == 0 && self.up.get() == 1 {
            tracing::warn!(stale_cycles = stale, "No reader succeeded for too long, marking exporter as down");
        }
        self.up.set(up);
    }

    pub fn record_published(&self, sequence: u64) {
        self.sequence.set(sequence as i64);
    }

    pub fn stale(&self) -> i64 {
        self.stale.get()
    }

    pub fn up(&self) -> bool {
        self.up.get() == 1
    }

    pub fn skipped_cycles(&self) -> u64 {
        self.skipped_cycles.get()
    }

    pub fn cycles(&self, outcome: CycleOutcome) -> u64 {
        self.cycles.with_label_values(&[outcome.as_str()]).get()
    }

    pub fn reader_failures(&self, reader: &str, kind: ReaderErrorKind) -> u64 {
        self.reader_failures
            .with_label_values(&[reader, kind.as_str()])
            .get()
    }
}
