//! Priority task scheduler with admission control
//!
//! Ready tasks live in a max-heap ordered by `(priority desc, queued_at asc,
//! sequence asc)`. Tasks scheduled in the future (retries under backoff) sit
//! in a second heap ordered by `scheduled_at` and are promoted when due. Both
//! heaps share one `parking_lot::Mutex`; waiting workers park on a
//! `tokio::sync::Notify`.

use std::cmp::{Ordering as CmpOrdering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::Notify;
use tracing::{info, warn};

use super::stats::IndexingStats;
use super::task::IndexingTask;

/// Why a task was refused at admission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("scheduler is not running")]
    NotRunning,
    #[error("memory usage is at the limit")]
    MemoryCritical,
    #[error("queue is full")]
    QueueFull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    Rejected(RejectReason),
}

impl Admission {
    #[must_use]
    pub fn is_accepted(self) -> bool {
        self == Admission::Accepted
    }
}

/// A retry the scheduler would not take back, with the task returned
#[derive(Debug, Error)]
#[error("retry refused: {reason}")]
pub struct RetryRefused {
    pub task: IndexingTask,
    pub reason: RejectReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerLimits {
    pub max_queue_size: usize,
    pub memory_warning_threshold: u64,
    pub memory_limit_threshold: u64,
}

struct ReadyEntry(IndexingTask);

impl ReadyEntry {
    fn key(&self) -> (i32, Reverse<DateTime<Utc>>, Reverse<u64>) {
        (
            self.0.priority,
            Reverse(self.0.queued_at),
            Reverse(self.0.sequence),
        )
    }
}

impl PartialEq for ReadyEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for ReadyEntry {}

impl PartialOrd for ReadyEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for ReadyEntry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.key().cmp(&other.key())
    }
}

/// Earliest `scheduled_at` on top
struct DelayedEntry(IndexingTask);

impl DelayedEntry {
    fn key(&self) -> Reverse<(DateTime<Utc>, u64)> {
        Reverse((self.0.scheduled_at, self.0.sequence))
    }
}

impl PartialEq for DelayedEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for DelayedEntry {}

impl PartialOrd for DelayedEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for DelayedEntry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.key().cmp(&other.key())
    }
}

#[derive(Default)]
struct QueueState {
    ready: BinaryHeap<ReadyEntry>,
    delayed: BinaryHeap<DelayedEntry>,
    memory_bytes: u64,
    next_sequence: u64,
    memory_warning_active: bool,
}

impl QueueState {
    fn len(&self) -> usize {
        self.ready.len() + self.delayed.len()
    }

    fn insert(&mut self, mut task: IndexingTask, now: DateTime<Utc>) {
        task.sequence = self.next_sequence;
        self.next_sequence += 1;
        self.memory_bytes += task.estimated_size_bytes();
        if task.is_ready(now) {
            self.ready.push(ReadyEntry(task));
        } else {
            self.delayed.push(DelayedEntry(task));
        }
    }

    fn promote_due(&mut self, now: DateTime<Utc>) {
        while self
            .delayed
            .peek()
            .is_some_and(|entry| entry.0.is_ready(now))
        {
            if let Some(DelayedEntry(task)) = self.delayed.pop() {
                self.ready.push(ReadyEntry(task));
            }
        }
    }

    fn release(&mut self, task: &IndexingTask) {
        self.memory_bytes = self.memory_bytes.saturating_sub(task.estimated_size_bytes());
    }

    fn next_due_in(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.delayed.peek().map(|entry| {
            entry
                .0
                .scheduled_at
                .signed_duration_since(now)
                .to_std()
                .unwrap_or(Duration::ZERO)
        })
    }
}

pub struct TaskScheduler {
    state: Mutex<QueueState>,
    notify: Notify,
    running: AtomicBool,
    limits: SchedulerLimits,
    stats: Arc<IndexingStats>,
}

impl TaskScheduler {
    #[must_use]
    pub fn new(limits: SchedulerLimits, stats: Arc<IndexingStats>) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            running: AtomicBool::new(false),
            limits,
            stats,
        }
    }

    pub fn start(&self) {
        self.running.store(true, Ordering::Release);
    }

    /// Refuse new work and wake every waiting worker
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        self.notify.notify_waiters();
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn publish_gauges(&self, state: &mut QueueState) {
        self.stats.set_queue_size(state.len());
        self.stats.set_memory_usage(state.memory_bytes);

        let over = state.memory_bytes >= self.limits.memory_warning_threshold;
        if over && !state.memory_warning_active {
            warn!(
                memory_bytes = state.memory_bytes,
                threshold = self.limits.memory_warning_threshold,
                "Indexing queue memory above warning threshold"
            );
        } else if !over && state.memory_warning_active {
            info!(
                memory_bytes = state.memory_bytes,
                "Indexing queue memory back below warning threshold"
            );
        }
        state.memory_warning_active = over;
    }

    fn insert_checked(&self, task: IndexingTask) -> Result<(), (IndexingTask, RejectReason)> {
        if !self.is_running() {
            return Err((task, RejectReason::NotRunning));
        }
        {
            let mut state = self.state.lock();
            if state.memory_bytes >= self.limits.memory_limit_threshold {
                return Err((task, RejectReason::MemoryCritical));
            }
            if state.len() >= self.limits.max_queue_size {
                return Err((task, RejectReason::QueueFull));
            }
            state.insert(task, Utc::now());
            self.publish_gauges(&mut state);
        }
        self.notify.notify_one();
        Ok(())
    }

    /// Admit a new task unless stopped, memory-critical or full
    pub fn try_push(&self, task: IndexingTask) -> Admission {
        match self.insert_checked(task) {
            Ok(()) => Admission::Accepted,
            Err((_, reason)) => Admission::Rejected(reason),
        }
    }

    /// Reinsert a task being retried under the same limits as new work
    ///
    /// A refused retry hands the task back so it can be dead-lettered.
    pub fn push_retry(&self, task: IndexingTask) -> Result<(), RetryRefused> {
        self.insert_checked(task)
            .map_err(|(task, reason)| RetryRefused { task, reason })
    }

    /// Up to `max` tasks due at `now`, highest priority first
    pub fn pop_ready_batch(&self, max: usize, now: DateTime<Utc>) -> Vec<IndexingTask> {
        let mut state = self.state.lock();
        state.promote_due(now);
        let mut batch = Vec::with_capacity(max.min(state.ready.len()));
        while batch.len() < max {
            let Some(ReadyEntry(task)) = state.ready.pop() else {
                break;
            };
            state.release(&task);
            batch.push(task);
        }
        if !batch.is_empty() {
            self.publish_gauges(&mut state);
        }
        batch
    }

    /// Every queued task regardless of `scheduled_at`, in priority order
    pub fn drain_all(&self) -> Vec<IndexingTask> {
        let mut state = self.state.lock();
        while let Some(DelayedEntry(task)) = state.delayed.pop() {
            state.ready.push(ReadyEntry(task));
        }
        let mut tasks = Vec::with_capacity(state.ready.len());
        while let Some(ReadyEntry(task)) = state.ready.pop() {
            tasks.push(task);
        }
        state.memory_bytes = 0;
        self.publish_gauges(&mut state);
        tasks
    }

    /// Drop every queued task; returns how many were dropped
    pub fn clear(&self) -> usize {
        let mut state = self.state.lock();
        let dropped = state.len();
        state.ready.clear();
        state.delayed.clear();
        state.memory_bytes = 0;
        self.publish_gauges(&mut state);
        dropped
    }

    fn has_ready_work(&self, now: DateTime<Utc>) -> (bool, Option<Duration>) {
        let state = self.state.lock();
        let ready = !state.ready.is_empty()
            || state.delayed.peek().is_some_and(|entry| entry.0.is_ready(now));
        (ready, state.next_due_in(now))
    }

    /// Park until work is pushed, the scheduler stops, a delayed task falls
    /// due or `timeout` elapses
    pub async fn wait_for_work(&self, timeout: Duration) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if !self.is_running() {
            return;
        }
        let (ready, next_due) = self.has_ready_work(Utc::now());
        if ready {
            return;
        }
        let wait = next_due.map_or(timeout, |due| due.min(timeout));
        let _ = tokio::time::timeout(wait, notified).await;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn memory_usage_bytes(&self) -> u64 {
        self.state.lock().memory_bytes
    }

    #[must_use]
    pub fn is_memory_critical(&self) -> bool {
        self.memory_usage_bytes() >= self.limits.memory_limit_threshold
    }

    #[must_use]
    pub fn limits(&self) -> SchedulerLimits {
        self.limits
    }
}
