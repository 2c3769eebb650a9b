use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing pipeline activity.
#[derive(Default)]
pub struct PipelineMetrics {
    documents_summarized: AtomicU64,
    chunks_processed: AtomicU64,
    chunks_failed: AtomicU64,
    jobs_dispatched: AtomicU64,
    dispatch_failures: AtomicU64,
    jobs_completed: AtomicU64,
}

impl PipelineMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a summarized document with its chunk totals.
    pub fn record_summary(&self, chunk_count: u64, failed_chunks: u64) {
        self.documents_summarized.fetch_add(1, Ordering::Relaxed);
        self.chunks_processed.fetch_add(chunk_count, Ordering::Relaxed);
        self.chunks_failed.fetch_add(failed_chunks, Ordering::Relaxed);
    }

    /// Record a job handed to the background executor.
    pub fn record_dispatch(&self) {
        self.jobs_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a dispatch whose transport failed after the caller was answered.
    pub fn record_dispatch_failure(&self) {
        self.dispatch_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a job the executor finished.
    pub fn record_job_completed(&self) {
        self.jobs_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_summarized: self.documents_summarized.load(Ordering::Relaxed),
            chunks_processed: self.chunks_processed.load(Ordering::Relaxed),
            chunks_failed: self.chunks_failed.load(Ordering::Relaxed),
            jobs_dispatched: self.jobs_dispatched.load(Ordering::Relaxed),
            dispatch_failures: self.dispatch_failures.load(Ordering::Relaxed),
            jobs_completed: self.jobs_completed.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of pipeline counters used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Documents summarized since startup.
    pub documents_summarized: u64,
    /// Chunks sent to the model.
    pub chunks_processed: u64,
    /// Chunks whose completion failed and were omitted from the merge.
    pub chunks_failed: u64,
    /// Derived-asset jobs dispatched.
    pub jobs_dispatched: u64,
    /// Dispatches whose transport failed.
    pub dispatch_failures: u64,
    /// Jobs completed by the background executor.
    pub jobs_completed: u64,
}
