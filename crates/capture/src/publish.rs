//! Snapshot and latest-frame publication.
//!
//! Single writer (the capture loop), any number of readers. Each publish
//! swaps in a fresh `Arc`; readers clone the `Arc` and never hold the writer up.

use std::sync::Arc;

use contracts::{Frame, ServiceSnapshot};
use tokio::sync::watch;

use crate::{CaptureError, Result};

/// Writer side, owned by the orchestrator
#[derive(Debug)]
pub struct Publisher {
    snapshot_tx: watch::Sender<Arc<ServiceSnapshot>>,
    frame_tx: watch::Sender<Option<Arc<Frame>>>,
}

impl Publisher {
    pub fn new() -> Self {
        let (snapshot_tx, _) = watch::channel(Arc::new(ServiceSnapshot::default()));
        let (frame_tx, _) = watch::channel(None);
        Self {
            snapshot_tx,
            frame_tx,
        }
    }

    /// Replace the published snapshot and frame
    pub fn publish(&self, snapshot: ServiceSnapshot, frame: Frame) {
        self.frame_tx.send_replace(Some(Arc::new(frame)));
        self.snapshot_tx.send_replace(Arc::new(snapshot));
    }

    pub fn subscribe(&self) -> StatusReader {
        StatusReader {
            snapshot_rx: self.snapshot_tx.subscribe(),
            frame_rx: self.frame_tx.subscribe(),
        }
    }
}

impl Default for Publisher {
    fn default() -> Self {
        Self::new()
    }
}

/// Reader side; cheap to clone
#[derive(Debug, Clone)]
pub struct StatusReader {
    snapshot_rx: watch::Receiver<Arc<ServiceSnapshot>>,
    frame_rx: watch::Receiver<Option<Arc<Frame>>>,
}

impl StatusReader {
    /// Latest snapshot (default before the first tick)
    pub fn snapshot(&self) -> Arc<ServiceSnapshot> {
        Arc::clone(&self.snapshot_rx.borrow())
    }

    /// Latest processed frame, if any tick has completed
    pub fn latest_frame(&self) -> Option<Arc<Frame>> {
        self.frame_rx.borrow().clone()
    }

    /// Wait for the next snapshot newer than the last one seen by this reader
    pub async fn changed(&mut self) -> Result<Arc<ServiceSnapshot>> {
        self.snapshot_rx
            .changed()
            .await
            .map_err(|_| CaptureError::PublisherClosed)?;
        Ok(Arc::clone(&self.snapshot_rx.borrow_and_update()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::ImageData;

    fn frame(frame_id: u64) -> Frame {
        Frame {
            frame_id,
            timestamp: frame_id as f64,
            image: ImageData::filled(2, 2, 0),
        }
    }

    #[test]
    fn test_reader_sees_latest_only() {
        let publisher = Publisher::new();
        let reader = publisher.subscribe();
        assert_eq!(reader.snapshot().total_frames, 0);
        assert!(reader.latest_frame().is_none());

        for id in 1..=3 {
            let snapshot = ServiceSnapshot {
                total_frames: id,
                ..Default::default()
            };
            publisher.publish(snapshot, frame(id));
        }

        assert_eq!(reader.snapshot().total_frames, 3);
        assert_eq!(reader.latest_frame().unwrap().frame_id, 3);
    }

    #[test]
    fn test_held_snapshot_survives_publish() {
        let publisher = Publisher::new();
        let reader = publisher.subscribe();
        publisher.publish(
            ServiceSnapshot {
                total_frames: 1,
                ..Default::default()
            },
            frame(1),
        );

        let held = reader.snapshot();
        publisher.publish(
            ServiceSnapshot {
                total_frames: 2,
                ..Default::default()
            },
            frame(2),
        );
        assert_eq!(held.total_frames, 1);
        assert_eq!(reader.snapshot().total_frames, 2);
    }

    #[tokio::test]
    async fn test_changed_wakes_reader() {
        let publisher = Publisher::new();
        let mut reader = publisher.subscribe();

        let waiter = tokio::spawn(async move { reader.changed().await });
        tokio::task::yield_now().await;
        publisher.publish(
            ServiceSnapshot {
                total_frames: 9,
                ..Default::default()
            },
            frame(9),
        );

        let snapshot = waiter.await.unwrap().unwrap();
        assert_eq!(snapshot.total_frames, 9);
    }

    #[tokio::test]
    async fn test_changed_errors_after_writer_dropped() {
        let publisher = Publisher::new();
        let mut reader = publisher.subscribe();
        drop(publisher);
        assert!(matches!(
            reader.changed().await,
            Err(CaptureError::PublisherClosed)
        ));
    }
}
