//! Lock-free statistics tracking for the indexing pipeline
//!
//! Counters and timing sums are atomics; only the reset timestamp sits behind
//! a mutex. `snapshot()` produces a serializable, immutable copy with derived
//! rates.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use super::task::IndexingOperation;

#[inline]
fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Lock-free indexing statistics
#[derive(Debug)]
pub struct IndexingStats {
    pub notes_processed: AtomicU64,
    pub notes_indexed: AtomicU64,
    pub notes_updated: AtomicU64,
    pub notes_deleted: AtomicU64,
    pub notes_skipped: AtomicU64,
    pub notes_failed: AtomicU64,
    pub batches_processed: AtomicU64,
    pub batches_failed: AtomicU64,
    pub retries_attempted: AtomicU64,
    pub admissions_rejected: AtomicU64,

    pub total_processing_time_ms: AtomicU64,
    pub total_indexing_time_ms: AtomicU64,
    pub total_queue_time_ms: AtomicU64,
    pub content_analysis_time_ms: AtomicU64,
    pub scoring_time_ms: AtomicU64,

    pub current_queue_size: AtomicUsize,
    pub current_memory_usage_bytes: AtomicU64,
    pub active_worker_count: AtomicUsize,

    last_reset: Mutex<DateTime<Utc>>,
}

impl IndexingStats {
    #[must_use]
    pub fn new() -> Self {
        Self {
            notes_processed: AtomicU64::new(0),
            notes_indexed: AtomicU64::new(0),
            notes_updated: AtomicU64::new(0),
            notes_deleted: AtomicU64::new(0),
            notes_skipped: AtomicU64::new(0),
            notes_failed: AtomicU64::new(0),
            batches_processed: AtomicU64::new(0),
            batches_failed: AtomicU64::new(0),
            retries_attempted: AtomicU64::new(0),
            admissions_rejected: AtomicU64::new(0),
            total_processing_time_ms: AtomicU64::new(0),
            total_indexing_time_ms: AtomicU64::new(0),
            total_queue_time_ms: AtomicU64::new(0),
            content_analysis_time_ms: AtomicU64::new(0),
            scoring_time_ms: AtomicU64::new(0),
            current_queue_size: AtomicUsize::new(0),
            current_memory_usage_bytes: AtomicU64::new(0),
            active_worker_count: AtomicUsize::new(0),
            last_reset: Mutex::new(Utc::now()),
        }
    }

    /// One executed task; counts toward the per-operation counter on success
    pub fn record_operation(
        &self,
        operation: IndexingOperation,
        success: bool,
        processing: Duration,
        indexing: Duration,
    ) {
        self.notes_processed.fetch_add(1, Ordering::Relaxed);
        self.total_processing_time_ms
            .fetch_add(millis(processing), Ordering::Relaxed);
        self.total_indexing_time_ms
            .fetch_add(millis(indexing), Ordering::Relaxed);

        if !success {
            self.notes_failed.fetch_add(1, Ordering::Relaxed);
            return;
        }
        let counter = match operation {
            IndexingOperation::Create => &self.notes_indexed,
            IndexingOperation::Update | IndexingOperation::UpdateMetrics => &self.notes_updated,
            IndexingOperation::Delete => &self.notes_deleted,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_batch(&self, had_failures: bool) {
        self.batches_processed.fetch_add(1, Ordering::Relaxed);
        if had_failures {
            self.batches_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_skip(&self) {
        self.notes_skipped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_retry(&self) {
        self.retries_attempted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_rejection(&self) {
        self.admissions_rejected.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_queue_time(&self, waited: Duration) {
        self.total_queue_time_ms
            .fetch_add(millis(waited), Ordering::Relaxed);
    }

    pub fn record_preparation(&self, analysis: Duration, scoring: Duration) {
        self.content_analysis_time_ms
            .fetch_add(millis(analysis), Ordering::Relaxed);
        self.scoring_time_ms
            .fetch_add(millis(scoring), Ordering::Relaxed);
    }

    #[inline]
    pub fn set_queue_size(&self, size: usize) {
        self.current_queue_size.store(size, Ordering::Relaxed);
    }

    #[inline]
    pub fn set_memory_usage(&self, bytes: u64) {
        self.current_memory_usage_bytes
            .store(bytes, Ordering::Relaxed);
    }

    #[inline]
    pub fn worker_started(&self) {
        self.active_worker_count.fetch_add(1, Ordering::AcqRel);
    }

    #[inline]
    pub fn worker_stopped(&self) {
        self.active_worker_count.fetch_sub(1, Ordering::AcqRel);
    }

    #[must_use]
    pub fn active_workers(&self) -> usize {
        self.active_worker_count.load(Ordering::Acquire)
    }

    /// Zero counters and timing sums; live gauges are kept
    pub fn reset(&self) {
        for counter in [
            &self.notes_processed,
            &self.notes_indexed,
            &self.notes_updated,
            &self.notes_deleted,
            &self.notes_skipped,
            &self.notes_failed,
            &self.batches_processed,
            &self.batches_failed,
            &self.retries_attempted,
            &self.admissions_rejected,
            &self.total_processing_time_ms,
            &self.total_indexing_time_ms,
            &self.total_queue_time_ms,
            &self.content_analysis_time_ms,
            &self.scoring_time_ms,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        *self.last_reset.lock() = Utc::now();
    }

    /// Get snapshot of current statistics
    #[must_use]
    pub fn snapshot(&self) -> IndexingMetricsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        let last_reset = *self.last_reset.lock();
        let uptime_ms = Utc::now()
            .signed_duration_since(last_reset)
            .num_milliseconds()
            .max(0) as u64;

        let notes_processed = load(&self.notes_processed);
        let notes_failed = load(&self.notes_failed);
        let total_processing_time_ms = load(&self.total_processing_time_ms);

        let uptime_seconds = uptime_ms as f64 / 1000.0;
        let processing_rate_per_second = if uptime_seconds > 0.0 {
            notes_processed as f64 / uptime_seconds
        } else {
            0.0
        };
        let (success_rate, average_processing_time_ms) = if notes_processed > 0 {
            (
                notes_processed.saturating_sub(notes_failed) as f64 / notes_processed as f64,
                total_processing_time_ms as f64 / notes_processed as f64,
            )
        } else {
            (0.0, 0.0)
        };

        IndexingMetricsSnapshot {
            notes_processed,
            notes_indexed: load(&self.notes_indexed),
            notes_updated: load(&self.notes_updated),
            notes_deleted: load(&self.notes_deleted),
            notes_skipped: load(&self.notes_skipped),
            notes_failed,
            batches_processed: load(&self.batches_processed),
            batches_failed: load(&self.batches_failed),
            retries_attempted: load(&self.retries_attempted),
            admissions_rejected: load(&self.admissions_rejected),
            total_processing_time_ms,
            total_indexing_time_ms: load(&self.total_indexing_time_ms),
            total_queue_time_ms: load(&self.total_queue_time_ms),
            content_analysis_time_ms: load(&self.content_analysis_time_ms),
            scoring_time_ms: load(&self.scoring_time_ms),
            current_queue_size: self.current_queue_size.load(Ordering::Relaxed),
            current_memory_usage_bytes: load(&self.current_memory_usage_bytes),
            active_worker_count: self.active_worker_count.load(Ordering::Relaxed),
            last_reset,
            processing_rate_per_second,
            success_rate,
            average_processing_time_ms,
            uptime_seconds,
        }
    }
}

impl Default for IndexingStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable snapshot of indexing statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexingMetricsSnapshot {
    pub notes_processed: u64,
    pub notes_indexed: u64,
    pub notes_updated: u64,
    pub notes_deleted: u64,
    pub notes_skipped: u64,
    pub notes_failed: u64,
    pub batches_processed: u64,
    pub batches_failed: u64,
    pub retries_attempted: u64,
    pub admissions_rejected: u64,
    pub total_processing_time_ms: u64,
    pub total_indexing_time_ms: u64,
    pub total_queue_time_ms: u64,
    pub content_analysis_time_ms: u64,
    pub scoring_time_ms: u64,
    pub current_queue_size: usize,
    pub current_memory_usage_bytes: u64,
    pub active_worker_count: usize,
    pub last_reset: DateTime<Utc>,
    pub processing_rate_per_second: f64,
    pub success_rate: f64,
    pub average_processing_time_ms: f64,
    pub uptime_seconds: f64,
}
