use crate::config::Sampling;
use crate::domain::{
    BoardIdentity, BoardInfo, CycleOutcome, ReaderError, ReaderErrorKind, ReaderResult, Sensor,
    Snapshot,
};
use crate::health::HealthMetrics;
use crate::metrics::board_info::board_info_point;
use crate::registry::{MetricRegistry, PublishError};
use futures::FutureExt;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};

/// Summary of one sampling cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub sequence: u64,
    pub outcome: CycleOutcome,
    pub succeeded: usize,
    pub failures: Vec<(&'static str, ReaderErrorKind)>,
    pub duration: Duration,
    pub published: bool,
}

enum TaskOutput {
    Reader(&'static str, ReaderResult),
    Board(Result<BoardInfo, ReaderError>),
}

/// Drives the sensors on a fixed period and publishes one snapshot per cycle.
#[derive(Clone)]
pub struct Aggregator {
    sensors: Arc<Vec<Arc<dyn Sensor>>>,
    board: Option<Arc<dyn BoardIdentity>>,
    registry: Arc<MetricRegistry>,
    health: HealthMetrics,
    sampling: Sampling,
    board_refreshed_at: Arc<Mutex<Option<Instant>>>,
}

impl Aggregator {
    pub fn new(
        sensors: Vec<Arc<dyn Sensor>>,
        registry: Arc<MetricRegistry>,
        health: HealthMetrics,
        sampling: Sampling,
    ) -> Self {
        Self {
            sensors: Arc::new(sensors),
            board: None,
            registry,
            health,
            sampling,
            board_refreshed_at: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_board_identity(mut self, board: Arc<dyn BoardIdentity>) -> Self {
        self.board = Some(board);
        self
    }

    /// Samples until `shutdown` flips to `true` (or its sender is dropped), then
    /// cancels the in-flight cycle and closes the registry.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.sampling.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            interval = ?self.sampling.interval(),
            deadline = ?self.sampling.deadline(),
            readers = self.sensors.len(),
            "Sampling started"
        );

        let mut in_flight = None;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.on_tick(&mut in_flight);
                }

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        if let Some(handle) = in_flight.take() {
            handle.abort();
        }

        self.registry.close();
        tracing::info!("Sampling stopped");
    }

    /// Starts a new cycle unless the previous one is still running. Returns
    /// whether a cycle was started.
    fn on_tick(&self, in_flight: &mut Option<JoinHandle<CycleReport>>) -> bool {
        if let Some(handle) = in_flight.take() {
            if !handle.is_finished() {
                *in_flight = Some(handle);
                self.health.record_skipped_cycle();
                tracing::warn!("Previous sampling cycle is still running, skipping this tick");
                return false;
            }

            if let Some(Err(e)) = handle.now_or_never() {
                tracing::error!(error = %e, "Sampling cycle task failed");
            }
        }

        let aggregator = self.clone();
        *in_flight = Some(tokio::spawn(async move { aggregator.run_cycle().await }));
        true
    }

    /// Re-reads the board identity and stores it in the registry.
    pub async fn refresh_board_info(&self) {
        let Some(board) = self.board.clone() else {
            return;
        };

        self.mark_board_refreshed();
        let result = read_board_info(board, self.sampling.reader_timeout()).await;
        self.apply_board_info(result);
    }

    fn mark_board_refreshed(&self) {
        *self
            .board_refreshed_at
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(Instant::now());
    }

    /// A failed read keeps the previously known identity.
    fn apply_board_info(&self, result: Result<BoardInfo, ReaderError>) {
        match result {
            Ok(info) => {
                tracing::debug!(?info, "Board identity refreshed");
                self.registry.set_board_info(info);
            }
            Err(e) => {
                tracing::warn!(error = %e, kind = e.kind().as_str(), "Failed to read board identity");
            }
        }
    }

    fn board_info_due(&self) -> bool {
        let Some(every) = self.sampling.board_info_refresh() else {
            return false;
        };

        let last = *self
            .board_refreshed_at
            .lock()
            .unwrap_or_else(|e| e.into_inner());

        last.is_none_or(|at| at.elapsed() >= every)
    }

    pub async fn run_cycle(&self) -> CycleReport {
        let started = Instant::now();
        let deadline = started + self.sampling.deadline();
        let reader_timeout = self.sampling.reader_timeout();

        let mut tasks = JoinSet::new();
        for sensor in self.sensors.iter() {
            let sensor = Arc::clone(sensor);
            tasks.spawn(async move {
                let result: ReaderResult = match tokio::time::timeout(reader_timeout, sensor.sample()).await {
                    Ok(result) => result,
                    Err(_) => Err(ReaderError::Timeout(reader_timeout)),
                };

                TaskOutput::Reader(sensor.name(), result)
            });
        }

        // runs beside the readers, a slow board read never holds them back
        if let Some(board) = self.board.clone().filter(|_| self.board_info_due()) {
            self.mark_board_refreshed();
            tasks.spawn(async move { TaskOutput::Board(read_board_info(board, reader_timeout).await) });
        }

        let mut points = vec![];
        let mut failures = vec![];
        let mut finished = HashSet::new();
        let mut succeeded = 0;
        let mut overrun = false;

        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok(TaskOutput::Board(result)))) => self.apply_board_info(result),
                Ok(Some(Ok(TaskOutput::Reader(name, result)))) => {
                    finished.insert(name);
                    match result {
                        Ok(sampled) => {
                            succeeded += 1;
                            points.extend(sampled);
                        }
                        Err(e) => {
                            tracing::warn!(reader = name, kind = e.kind().as_str(), error = %e, "Reader failed");
                            failures.push((name, e.kind()));
                        }
                    }
                }
                Ok(Some(Err(e))) => {
                    tracing::error!(error = %e, "Reader task failed");
                }
                Ok(None) => break,
                Err(_) => {
                    // a late board read alone does not make the cycle an overrun
                    overrun = self.sensors.iter().any(|s| !finished.contains(s.name()));
                    tasks.abort_all();
                    break;
                }
            }
        }

        // Whatever did not report back was either cancelled at the deadline or panicked
        for sensor in self.sensors.iter() {
            if !finished.contains(sensor.name()) {
                let kind = if overrun {
                    ReaderErrorKind::Timeout
                } else {
                    ReaderErrorKind::Unavailable
                };

                tracing::warn!(reader = sensor.name(), kind = kind.as_str(), "Reader did not complete");
                failures.push((sensor.name(), kind));
            }
        }

        for (reader, kind) in &failures {
            self.health.record_reader_failure(reader, *kind);
        }

        if let Some(info) = self.registry.board_info() {
            points.push(board_info_point(&info));
        }

        let outcome = if overrun {
            CycleOutcome::Overrun
        } else if succeeded == 0 && !self.sensors.is_empty() {
            CycleOutcome::TotalFailure
        } else if !failures.is_empty() {
            CycleOutcome::PartialFailure
        } else {
            CycleOutcome::Complete
        };

        let sequence = self.registry.current().sequence() + 1;
        let published = match self.registry.publish(Snapshot::new(sequence, points)) {
            Ok(()) => {
                self.health.record_published(sequence);
                true
            }
            Err(PublishError::Closed) => {
                tracing::debug!(sequence, "Registry closed, dropping snapshot");
                false
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to publish snapshot");
                false
            }
        };

        let duration = started.elapsed();
        self.health.record_cycle(outcome, succeeded, duration);

        if outcome == CycleOutcome::Overrun {
            tracing::warn!(sequence, ?duration, "Sampling cycle exceeded its deadline");
        }

        tracing::debug!(
            sequence,
            outcome = outcome.as_str(),
            succeeded,
            failed = failures.len(),
            ?duration,
            "Sampling cycle finished"
        );

        CycleReport {
            sequence,
            outcome,
            succeeded,
            failures,
            duration,
            published,
        }
    }
}

async fn read_board_info(board: Arc<dyn BoardIdentity>, timeout: Duration) -> Result<BoardInfo, ReaderError> {
    match tokio::time::timeout(timeout, board.board_info()).await {
        Ok(result) => result,
        Err(_) => Err(ReaderError::Timeout(timeout)),
    }
}
