//! Background workers draining the task scheduler
//!
//! Each worker parks on the scheduler, pulls a ready batch, executes it
//! against the backend and then either retries or dead-letters whatever
//! failed. In real-time mode tasks are written one at a time; otherwise the
//! whole batch goes to the bulk buffer and each task waits for its receipt.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::backend::{BackendError, BackendResult, BulkOperation, BulkReceipt, IndexBackend};

use super::failed_log::FailedOperationLog;
use super::scheduler::TaskScheduler;
use super::stats::IndexingStats;
use super::task::{IndexingOperation, IndexingTask};

/// Upper bound on how long a paused worker sleeps between checks
const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy)]
pub(crate) struct WorkerSettings {
    pub batch_size: usize,
    pub batch_timeout: Duration,
    pub max_retry_attempts: u32,
    pub retry_delay: Duration,
    pub real_time: bool,
}

/// State shared by every worker and the owning indexer
pub(crate) struct WorkerContext<B> {
    pub scheduler: Arc<TaskScheduler>,
    pub backend: Arc<B>,
    pub stats: Arc<IndexingStats>,
    pub failed_log: Arc<FailedOperationLog>,
    pub paused: AtomicBool,
    pub settings: WorkerSettings,
}

impl<B: IndexBackend> WorkerContext<B> {
    pub(crate) fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Execute `tasks` in order; returns how many failed
    pub(crate) async fn process_batch(&self, tasks: Vec<IndexingTask>) -> usize {
        let total = tasks.len();
        let failures = if self.settings.real_time {
            let mut failures = 0;
            for task in tasks {
                if !self.process_task(task).await {
                    failures += 1;
                }
            }
            failures
        } else {
            self.process_bulk(tasks).await
        };
        self.stats.record_batch(failures > 0);
        debug!(total, failures, "Indexing batch processed");
        failures
    }

    async fn process_task(&self, task: IndexingTask) -> bool {
        let started = Instant::now();
        self.record_queue_time(&task);
        let call_started = Instant::now();
        let result = self.execute(&task).await;
        self.complete(task, result, started, call_started.elapsed())
    }

    /// Submit every task to the bulk buffer, then settle each from its receipt
    async fn process_bulk(&self, tasks: Vec<IndexingTask>) -> usize {
        let started = Instant::now();
        let submitted: Vec<(IndexingTask, BackendResult<BulkReceipt>)> = tasks
            .into_iter()
            .map(|task| {
                self.record_queue_time(&task);
                let receipt = self.submit(&task);
                (task, receipt)
            })
            .collect();

        let mut failures = 0;
        for (task, receipt) in submitted {
            let result = match receipt {
                Ok(receipt) => receipt.wait().await,
                Err(e) => Err(e),
            };
            if !self.complete(task, result, started, started.elapsed()) {
                failures += 1;
            }
        }
        failures
    }

    fn record_queue_time(&self, task: &IndexingTask) {
        let waited = Utc::now()
            .signed_duration_since(task.queued_at)
            .to_std()
            .unwrap_or_default();
        self.stats.record_queue_time(waited);
    }

    /// Record the outcome of one task; returns whether it succeeded
    fn complete(
        &self,
        task: IndexingTask,
        result: BackendResult<()>,
        started: Instant,
        indexing: Duration,
    ) -> bool {
        self.stats
            .record_operation(task.operation, result.is_ok(), started.elapsed(), indexing);

        match result {
            Ok(()) => {
                debug!(
                    correlation_id = %task.correlation_id,
                    note_id = %task.note.id,
                    operation = task.operation.as_str(),
                    elapsed_ms = indexing.as_millis() as u64,
                    "Indexing task completed"
                );
                true
            }
            Err(err) => {
                self.handle_failure(task, &err);
                false
            }
        }
    }

    async fn execute(&self, task: &IndexingTask) -> BackendResult<()> {
        let backend = &*self.backend;
        let note = &task.note;
        let routing = note.routing_key();

        match task.operation {
            IndexingOperation::Create | IndexingOperation::Update => {
                backend
                    .index_note(&note.id, routing, &stamped_document(task)?)
                    .await
            }
            IndexingOperation::Delete => backend.delete_note(&note.id, routing).await,
            IndexingOperation::UpdateMetrics => {
                backend
                    .update_note_metrics(&note.id, routing, &note.metrics_document()?)
                    .await
            }
        }
    }

    fn submit(&self, task: &IndexingTask) -> BackendResult<BulkReceipt> {
        let backend = &*self.backend;
        let note = &task.note;
        let index = backend.notes_index();
        let operation = match task.operation {
            IndexingOperation::Create | IndexingOperation::Update => {
                BulkOperation::index(index, note.id.as_str(), stamped_document(task)?)
            }
            IndexingOperation::Delete => BulkOperation::delete(index, note.id.as_str()),
            IndexingOperation::UpdateMetrics => {
                BulkOperation::update(index, note.id.as_str(), note.metrics_document()?)
            }
        };
        backend.submit_bulk_operation(operation.with_routing(note.routing_key()))
    }

    fn handle_failure(&self, mut task: IndexingTask, err: &BackendError) {
        if !err.is_transient() || !task.should_retry(self.settings.max_retry_attempts) {
            error!(
                correlation_id = %task.correlation_id,
                note_id = %task.note.id,
                operation = task.operation.as_str(),
                retry_count = task.retry_count,
                transient = err.is_transient(),
                error = %err,
                "Indexing task failed permanently"
            );
            self.failed_log.record(&task, err.to_string());
            return;
        }

        let delay = task.reschedule(self.settings.retry_delay, Utc::now());
        let correlation_id = task.correlation_id.clone();
        let attempt = task.retry_count;
        match self.scheduler.push_retry(task) {
            Ok(()) => {
                self.stats.record_retry();
                warn!(
                    %correlation_id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Indexing task failed, retry scheduled"
                );
            }
            Err(refused) => {
                let task = refused.task;
                error!(
                    correlation_id = %task.correlation_id,
                    note_id = %task.note.id,
                    reason = %refused.reason,
                    error = %err,
                    "Retry not queued"
                );
                self.failed_log.record(
                    &task,
                    format!("retry not queued, {}: {err}", refused.reason),
                );
            }
        }
    }
}

/// Full search document with `indexing_metadata.indexed_at` set to now
fn stamped_document(task: &IndexingTask) -> serde_json::Result<Value> {
    let mut document = task.note.to_search_document()?;
    if let Some(metadata) = document
        .get_mut("indexing_metadata")
        .and_then(Value::as_object_mut)
    {
        metadata.insert(
            "indexed_at".to_string(),
            json!(Utc::now().timestamp_millis()),
        );
    }
    Ok(document)
}

async fn worker_loop<B: IndexBackend>(id: usize, ctx: Arc<WorkerContext<B>>) {
    ctx.stats.worker_started();
    debug!(worker = id, "Indexing worker started");

    while ctx.scheduler.is_running() {
        ctx.scheduler.wait_for_work(ctx.settings.batch_timeout).await;
        if !ctx.scheduler.is_running() {
            break;
        }
        if ctx.is_paused() {
            tokio::time::sleep(PAUSE_POLL_INTERVAL.min(ctx.settings.batch_timeout)).await;
            continue;
        }
        let batch = ctx
            .scheduler
            .pop_ready_batch(ctx.settings.batch_size, Utc::now());
        if batch.is_empty() {
            continue;
        }
        ctx.process_batch(batch).await;
    }

    ctx.stats.worker_stopped();
    debug!(worker = id, "Indexing worker stopped");
}

/// Handles of the spawned worker tasks
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub(crate) fn spawn<B: IndexBackend>(ctx: &Arc<WorkerContext<B>>, count: usize) -> Self {
        let handles = (0..count.max(1))
            .map(|id| tokio::spawn(worker_loop(id, Arc::clone(ctx))))
            .collect();
        Self { handles }
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Wait for every worker to exit; the scheduler must already be stopped
    pub async fn join(self) {
        let results = futures::future::join_all(self.handles).await;
        for (id, result) in results.into_iter().enumerate() {
            if let Err(err) = result {
                error!(worker = id, error = %err, "Indexing worker terminated abnormally");
            }
        }
    }
}
