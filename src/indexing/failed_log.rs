//! Dead-letter log for tasks that could not be delivered

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use super::task::{IndexingOperation, IndexingTask};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedOperation {
    pub correlation_id: String,
    pub operation: IndexingOperation,
    pub note_id: String,
    pub error: String,
    pub retry_count: u32,
    pub failed_at: DateTime<Utc>,
}

/// Bounded; the oldest record is evicted once full
pub struct FailedOperationLog {
    entries: Mutex<VecDeque<FailedOperation>>,
    capacity: usize,
}

impl FailedOperationLog {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    pub fn record(&self, task: &IndexingTask, error: impl Into<String>) {
        let entry = FailedOperation {
            correlation_id: task.correlation_id.clone(),
            operation: task.operation,
            note_id: task.note.id.clone(),
            error: error.into(),
            retry_count: task.retry_count,
            failed_at: Utc::now(),
        };
        let mut entries = self.entries.lock();
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Most recent first
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<FailedOperation> {
        self.entries.lock().iter().rev().take(limit).cloned().collect()
    }

    #[must_use]
    pub fn count_for(&self, note_id: &str) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|entry| entry.note_id == note_id)
            .count()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
