//! Lock-free delivery metrics for the backend client

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

#[inline]
fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Debug, Default)]
pub struct BackendMetrics {
    pub total_requests: AtomicU64,
    pub successful_requests: AtomicU64,
    pub failed_requests: AtomicU64,
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
    pub slow_operations: AtomicU64,
    pub bulk_flushes: AtomicU64,
    pub bulk_operations: AtomicU64,
    pub bulk_failures: AtomicU64,
    pub total_request_time_ms: AtomicU64,
}

impl BackendMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self, success: bool, elapsed: Duration) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
        self.total_request_time_ms
            .fetch_add(millis(elapsed), Ordering::Relaxed);
    }

    #[inline]
    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_slow_operation(&self) {
        self.slow_operations.fetch_add(1, Ordering::Relaxed);
    }

    /// One flush of `operations` items of which `failed_items` were rejected
    pub fn record_bulk_flush(&self, operations: usize, failed_items: usize) {
        self.bulk_flushes.fetch_add(1, Ordering::Relaxed);
        self.bulk_operations
            .fetch_add(operations as u64, Ordering::Relaxed);
        self.bulk_failures
            .fetch_add(failed_items as u64, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> BackendMetricsSnapshot {
        let total_requests = self.total_requests.load(Ordering::Relaxed);
        let successful_requests = self.successful_requests.load(Ordering::Relaxed);
        let cache_hits = self.cache_hits.load(Ordering::Relaxed);
        let cache_misses = self.cache_misses.load(Ordering::Relaxed);
        let total_request_time_ms = self.total_request_time_ms.load(Ordering::Relaxed);

        let ratio = |num: u64, den: u64| if den == 0 { 0.0 } else { num as f64 / den as f64 };

        BackendMetricsSnapshot {
            total_requests,
            successful_requests,
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            cache_hits,
            cache_misses,
            slow_operations: self.slow_operations.load(Ordering::Relaxed),
            bulk_flushes: self.bulk_flushes.load(Ordering::Relaxed),
            bulk_operations: self.bulk_operations.load(Ordering::Relaxed),
            bulk_failures: self.bulk_failures.load(Ordering::Relaxed),
            total_request_time_ms,
            cache_hit_rate: ratio(cache_hits, cache_hits + cache_misses),
            success_rate: ratio(successful_requests, total_requests),
            average_latency_ms: ratio(total_request_time_ms, total_requests),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.total_requests,
            &self.successful_requests,
            &self.failed_requests,
            &self.cache_hits,
            &self.cache_misses,
            &self.slow_operations,
            &self.bulk_flushes,
            &self.bulk_operations,
            &self.bulk_failures,
            &self.total_request_time_ms,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Immutable snapshot of backend metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BackendMetricsSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub slow_operations: u64,
    pub bulk_flushes: u64,
    pub bulk_operations: u64,
    pub bulk_failures: u64,
    pub total_request_time_ms: u64,
    pub cache_hit_rate: f64,
    pub success_rate: f64,
    pub average_latency_ms: f64,
}
