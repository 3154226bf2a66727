//! Bounded log of slow backend operations

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlowOperation {
    pub operation: String,
    pub target: String,
    pub duration_ms: u64,
    pub recorded_at: DateTime<Utc>,
}

/// Ring buffer; the oldest entry is dropped once `capacity` is reached
pub struct SlowOperationLog {
    entries: Mutex<VecDeque<SlowOperation>>,
    capacity: usize,
}

impl SlowOperationLog {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn record(&self, operation: &str, target: &str, elapsed: Duration) {
        let entry = SlowOperation {
            operation: operation.to_string(),
            target: target.to_string(),
            duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            recorded_at: Utc::now(),
        };
        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Most recent first
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<SlowOperation> {
        self.entries.lock().iter().rev().take(limit).cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
