use crate::domain::{BoardInfo, Snapshot};
use arc_swap::{ArcSwap, ArcSwapOption};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum PublishError {
    #[error("the registry is closed")]
    Closed,

    #[error("snapshot {offered} does not supersede the current snapshot {current}")]
    OutOfOrder { current: u64, offered: u64 },
}

/// Holds the one currently published snapshot and the last known board identity.
///
/// Snapshots are immutable once published; readers get an `Arc` to the value that
/// was current at the time of the call and keep using it even if a newer snapshot
/// is published meanwhile. Neither readers nor the writer ever wait on each other.
#[derive(Debug)]
pub struct MetricRegistry {
    current: ArcSwap<Snapshot>,
    board_info: ArcSwapOption<BoardInfo>,
    closed: AtomicBool,
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(Snapshot::empty()),
            board_info: ArcSwapOption::empty(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn current(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    pub fn publish(&self, snapshot: Snapshot) -> Result<(), PublishError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PublishError::Closed);
        }

        let snapshot = Arc::new(snapshot);
        loop {
            let current = self.current.load_full();
            if snapshot.sequence() <= current.sequence() {
                return Err(PublishError::OutOfOrder {
                    current: current.sequence(),
                    offered: snapshot.sequence(),
                });
            }

            // retry if another publish slipped in between the check and the swap
            let previous = self.current.compare_and_swap(&current, Arc::clone(&snapshot));
            if Arc::ptr_eq(&*previous, &current) {
                return Ok(());
            }
        }
    }

    pub fn board_info(&self) -> Option<Arc<BoardInfo>> {
        self.board_info.load_full()
    }

    pub fn set_board_info(&self, info: BoardInfo) {
        self.board_info.store(Some(Arc::new(info)));
    }

    /// Stops accepting publishes. The last snapshot stays readable.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MetricPoint;

    fn snapshot(sequence: u64, points: usize) -> Snapshot {
        let points = (1..=points)
            .map(|i| {
                let core = format!("cpu_{}", i);
                MetricPoint::gauge("jetson_usage_cpu", &[("cpu", core.as_str())], sequence)
            })
            .collect();

        Snapshot::new(sequence, points)
    }

    #[test]
    fn test_starts_empty() {
        let registry = MetricRegistry::new();
        let current = registry.current();
        assert_eq!(current.sequence(), 0);
        assert!(current.is_empty());
        assert!(registry.board_info().is_none());
    }

    #[test]
    fn test_publish_replaces_current() {
        let registry = MetricRegistry::new();
        registry.publish(snapshot(1, 2)).unwrap();
        registry.publish(snapshot(2, 4)).unwrap();

        let current = registry.current();
        assert_eq!(current.sequence(), 2);
        assert_eq!(current.points().len(), 4);
    }

    #[test]
    fn test_old_handle_survives_publish() {
        let registry = MetricRegistry::new();
        registry.publish(snapshot(1, 3)).unwrap();

        let old = registry.current();
        registry.publish(snapshot(2, 1)).unwrap();

        assert_eq!(old.sequence(), 1);
        assert_eq!(old.points().len(), 3);
        assert_eq!(registry.current().points().len(), 1);
    }

    #[test]
    fn test_rejects_non_increasing_sequence() {
        let registry = MetricRegistry::new();
        registry.publish(snapshot(5, 1)).unwrap();

        assert_eq!(
            registry.publish(snapshot(5, 1)),
            Err(PublishError::OutOfOrder {
                current: 5,
                offered: 5
            })
        );
        assert!(registry.publish(snapshot(3, 1)).is_err());
        assert_eq!(registry.current().sequence(), 5);
    }

    #[test]
    fn test_closed_registry_rejects_publish() {
        let registry = MetricRegistry::new();
        registry.publish(snapshot(1, 1)).unwrap();
        registry.close();

        assert_eq!(registry.publish(snapshot(2, 1)), Err(PublishError::Closed));
        assert_eq!(registry.current().sequence(), 1);
        assert!(registry.is_closed());
    }

    #[test]
    fn test_board_info_is_kept_separately() {
        let registry = MetricRegistry::new();
        registry.set_board_info(BoardInfo {
            codename: "jakku".to_owned(),
            ..Default::default()
        });
        registry.publish(snapshot(1, 1)).unwrap();

        assert_eq!(registry.board_info().unwrap().codename, "jakku");
    }

    #[test]
    fn test_racing_publishers_keep_sequence_monotonic() {
        let registry = Arc::new(MetricRegistry::new());

        let writers = (0..4u64)
            .map(|offset| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    let mut accepted = 0;
                    for step in 0..250u64 {
                        let sequence = step * 4 + offset + 1;
                        match registry.publish(snapshot(sequence, 1)) {
                            Ok(()) => accepted += 1,
                            Err(PublishError::OutOfOrder { current, offered }) => {
                                assert!(offered <= current)
                            }
                            Err(e) => panic!("unexpected error: {}", e),
                        }
                    }
                    accepted
                })
            })
            .collect::<Vec<_>>();

        let accepted: u64 = writers.into_iter().map(|w| w.join().unwrap()).sum();
        assert!(accepted >= 1);
        assert_eq!(registry.current().sequence(), 1000);
    }

    #[test]
    fn test_held_snapshot_does_not_block_publish() {
        let registry = MetricRegistry::new();
        registry.publish(snapshot(1, 2)).unwrap();

        let held = (0..16).map(|_| registry.current()).collect::<Vec<_>>();
        for sequence in 2..=10 {
            registry.publish(snapshot(sequence, 1)).unwrap();
        }

        assert!(held.iter().all(|s| s.sequence() == 1));
        assert_eq!(registry.current().sequence(), 10);
    }

    #[tokio::test]
    async fn test_concurrent_readers_never_see_partial_snapshots() {
        let registry = Arc::new(MetricRegistry::new());

        let writer = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                for sequence in 1..=200u64 {
                    registry.publish(snapshot(sequence, 8)).unwrap();
                    tokio::task::yield_now().await;
                }
            })
        };

        let mut readers = vec![];
        for _ in 0..4 {
            let registry = Arc::clone(&registry);
            readers.push(tokio::spawn(async move {
                let mut last = 0;
                for _ in 0..200 {
                    let current = registry.current();
                    assert!(current.sequence() >= last);
                    last = current.sequence();

                    if current.sequence() > 0 {
                        assert_eq!(current.points().len(), 8);
                        assert!(
                            current
                                .points()
                                .iter()
                                .all(|p| p.value == current.sequence() as f64)
                        );
                    }

                    tokio::task::yield_now().await;
                }
            }));
        }

        writer.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }

        assert_eq!(registry.current().sequence(), 200);
    }
}
