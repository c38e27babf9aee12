//! SinkHandle - owns a save sink behind a bounded queue and worker task
//!
//! `try_send` never blocks, so it is safe to call from the blocking capture
//! thread. When the worker falls behind, requests are dropped and counted.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use contracts::{FrameSink, SaveRequest};

use crate::metrics::SinkMetrics;

/// Handle to a running save worker
pub struct SinkHandle {
    name: String,
    tx: mpsc::Sender<SaveRequest>,
    metrics: Arc<SinkMetrics>,
    worker_handle: JoinHandle<()>,
}

impl SinkHandle {
    /// Spawn the worker task on the current tokio runtime
    pub fn spawn<S: FrameSink + 'static>(sink: S, queue_capacity: usize) -> Self {
        let name = sink.name().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(SinkMetrics::new());

        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.clone();

        let worker_handle = tokio::spawn(async move {
            save_worker(sink, rx, worker_metrics, worker_name).await;
        });

        Self {
            name,
            tx,
            metrics,
            worker_handle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Queue a request without waiting.
    ///
    /// Returns false if the queue is full or the worker is gone (request dropped).
    pub fn try_send(&self, request: SaveRequest) -> bool {
        match self.tx.try_send(request) {
            Ok(()) => {
                self.metrics
                    .set_queue_len(self.tx.max_capacity() - self.tx.capacity());
                true
            }
            Err(mpsc::error::TrySendError::Full(r)) => {
                self.metrics.inc_dropped_count();
                warn!(
                    sink = %self.name,
                    frame_id = r.frame.frame_id,
                    "Save queue full, detection frame dropped"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(sink = %self.name, "Save worker closed unexpectedly");
                false
            }
        }
    }

    /// Drain the queue, flush and close the sink
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.worker_handle.await {
            error!(sink = %self.name, error = ?e, "Save worker panicked");
        }
        debug!(sink = %self.name, "SinkHandle shutdown complete");
    }
}

#[instrument(name = "save_worker_loop", skip(sink, rx, metrics), fields(sink = %name))]
async fn save_worker<S: FrameSink>(
    mut sink: S,
    mut rx: mpsc::Receiver<SaveRequest>,
    metrics: Arc<SinkMetrics>,
    name: String,
) {
    debug!("Save worker started");

    while let Some(request) = rx.recv().await {
        metrics.set_queue_len(rx.len());

        match sink.save(&request).await {
            Ok(()) => metrics.inc_saved_count(),
            Err(e) => {
                // one bad write must not stop later saves
                metrics.inc_failure_count();
                error!(
                    frame_id = request.frame.frame_id,
                    error = %e,
                    "Save failed"
                );
            }
        }
    }

    if let Err(e) = sink.flush().await {
        error!(error = %e, "Flush failed on shutdown");
    }
    if let Err(e) = sink.close().await {
        error!(error = %e, "Close failed on shutdown");
    }

    debug!("Save worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ContractError, Frame, ImageData};
    use std::sync::atomic::{AtomicU64, Ordering};
    use tokio::time::{sleep, Duration};

    struct MockSink {
        name: String,
        saved: Arc<AtomicU64>,
        should_fail: bool,
        delay_ms: u64,
    }

    impl MockSink {
        fn new(name: &str, saved: &Arc<AtomicU64>) -> Self {
            Self {
                name: name.to_string(),
                saved: Arc::clone(saved),
                should_fail: false,
                delay_ms: 0,
            }
        }
    }

    impl FrameSink for MockSink {
        fn name(&self) -> &str {
            &self.name
        }

        async fn save(&mut self, _request: &SaveRequest) -> Result<(), ContractError> {
            if self.delay_ms > 0 {
                sleep(Duration::from_millis(self.delay_ms)).await;
            }
            if self.should_fail {
                return Err(ContractError::sink_write(&self.name, "mock failure"));
            }
            self.saved.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    fn request(frame_id: u64) -> SaveRequest {
        SaveRequest {
            frame: Frame {
                frame_id,
                timestamp: frame_id as f64,
                image: ImageData::filled(4, 4, 0),
            },
            regions: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_sink_handle_basic() {
        let saved = Arc::new(AtomicU64::new(0));
        let handle = SinkHandle::spawn(MockSink::new("test", &saved), 10);

        for i in 0..5 {
            assert!(handle.try_send(request(i)));
        }

        handle.shutdown().await;
        assert_eq!(saved.load(Ordering::Relaxed), 5);
    }

    #[tokio::test]
    async fn test_sink_handle_queue_full() {
        let saved = Arc::new(AtomicU64::new(0));
        let sink = MockSink {
            delay_ms: 100,
            ..MockSink::new("slow", &saved)
        };
        let handle = SinkHandle::spawn(sink, 2);

        for i in 0..10 {
            handle.try_send(request(i));
        }

        assert!(handle.metrics().dropped_count() > 0);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_sink_handle_failure_isolation() {
        let saved = Arc::new(AtomicU64::new(0));
        let sink = MockSink {
            should_fail: true,
            ..MockSink::new("failing", &saved)
        };
        let handle = SinkHandle::spawn(sink, 10);

        for i in 0..3 {
            handle.try_send(request(i));
        }

        sleep(Duration::from_millis(50)).await;
        assert_eq!(handle.metrics().failure_count(), 3);
        handle.shutdown().await;
    }
}
