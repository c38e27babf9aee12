//! Save worker counters

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Counters for one save worker, shared between the handle and the worker task
#[derive(Debug, Default)]
pub struct SinkMetrics {
    /// Requests waiting in the queue (approximate)
    queue_len: AtomicUsize,
    saved_count: AtomicU64,
    failure_count: AtomicU64,
    /// Requests rejected because the queue was full
    dropped_count: AtomicU64,
}

impl SinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    pub fn saved_count(&self) -> u64 {
        self.saved_count.load(Ordering::Relaxed)
    }

    pub fn inc_saved_count(&self) {
        self.saved_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn inc_failure_count(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    pub fn inc_dropped_count(&self) {
        self.dropped_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_len: self.queue_len(),
            saved_count: self.saved_count(),
            failure_count: self.failure_count(),
            dropped_count: self.dropped_count(),
        }
    }
}

/// Point-in-time copy of [`SinkMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub queue_len: usize,
    pub saved_count: u64,
    pub failure_count: u64,
    pub dropped_count: u64,
}
