//! Submission façade for the indexing pipeline
//!
//! `NoteIndexer` enriches incoming notes, filters them through the
//! `IndexingPolicy`, hands the survivors to the scheduler and owns the worker
//! pool. Every public submission method answers with a plain `bool` (or a
//! count); the reasons are visible in the logs and metrics.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::analysis::ContentAnalyzer;
use crate::backend::{IndexBackend, SearchBackendClient};
use crate::config::{ConfigError, IndexerConfig};
use crate::document::{IndexSource, NoteDocument, ValidationError};

use super::failed_log::{FailedOperation, FailedOperationLog};
use super::policy::{IndexingPolicy, SkipReason};
use super::scheduler::{Admission, RejectReason, SchedulerLimits, TaskScheduler};
use super::stats::{IndexingMetricsSnapshot, IndexingStats};
use super::task::{DELETE_PRIORITY, IndexingOperation, IndexingTask};
use super::worker::{WorkerContext, WorkerPool, WorkerSettings};

/// Admission attempts per note during a historical load before giving up
const HISTORICAL_ADMISSION_ATTEMPTS: u32 = 100;

/// Point-in-time view of the indexer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexerStatus {
    pub running: bool,
    pub ready: bool,
    pub paused: bool,
    pub active_workers: usize,
    pub queue_size: usize,
    pub memory_usage_bytes: u64,
}

/// Outcome of handing one note to the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Submission {
    Queued,
    Skipped,
    Rejected,
}

pub struct NoteIndexer<B: IndexBackend = SearchBackendClient> {
    config: IndexerConfig,
    analyzer: ContentAnalyzer,
    policy: IndexingPolicy,
    ctx: Arc<WorkerContext<B>>,
    pool: Mutex<Option<WorkerPool>>,
}

impl<B: IndexBackend> NoteIndexer<B> {
    /// Validate `config` and wire the scheduler; workers start on `start()`
    pub fn new(backend: Arc<B>, config: IndexerConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let stats = Arc::new(IndexingStats::new());
        let limits = SchedulerLimits {
            max_queue_size: config.max_queue_size(),
            memory_warning_threshold: config.memory_warning_threshold(),
            memory_limit_threshold: config.memory_limit_threshold(),
        };
        let scheduler = Arc::new(TaskScheduler::new(limits, Arc::clone(&stats)));
        let settings = WorkerSettings {
            batch_size: config.batch_size(),
            batch_timeout: config.batch_timeout(),
            max_retry_attempts: config.max_retry_attempts(),
            retry_delay: config.retry_delay(),
            real_time: config.real_time_indexing(),
        };
        let ctx = Arc::new(WorkerContext {
            scheduler,
            backend,
            stats,
            failed_log: Arc::new(FailedOperationLog::new(config.failed_log_capacity())),
            paused: Default::default(),
            settings,
        });

        Ok(Self {
            policy: IndexingPolicy::from(&config),
            analyzer: ContentAnalyzer::default(),
            config,
            ctx,
            pool: Mutex::new(None),
        })
    }

    #[must_use]
    pub fn with_analyzer(mut self, analyzer: ContentAnalyzer) -> Self {
        self.analyzer = analyzer;
        self
    }

    /// Spawn the worker pool; `false` if already running
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> bool {
        let mut pool = self.pool.lock();
        if pool.is_some() {
            return false;
        }
        self.ctx.scheduler.start();
        let workers = WorkerPool::spawn(&self.ctx, self.config.effective_worker_count());
        info!(
            workers = workers.size(),
            batch_size = self.config.batch_size(),
            real_time = self.config.real_time_indexing(),
            "Note indexer started"
        );
        *pool = Some(workers);
        true
    }

    /// Stop accepting work, join the workers and drop whatever is still queued
    ///
    /// Returns how many queued tasks were abandoned.
    pub async fn stop(&self) -> usize {
        self.ctx.scheduler.stop();
        let pool = self.pool.lock().take();
        if let Some(pool) = pool {
            pool.join().await;
        }
        let abandoned = self.ctx.scheduler.clear();
        if abandoned > 0 {
            warn!(abandoned, "Note indexer stopped with tasks still queued");
        } else {
            info!("Note indexer stopped");
        }
        abandoned
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.ctx.scheduler.is_running()
    }

    /// Queue a new note; a missing or non-positive priority is computed
    pub fn submit(&self, note: NoteDocument, priority: Option<i32>) -> bool {
        self.admit(IndexingOperation::Create, note, priority, IndexSource::Realtime)
            == Submission::Queued
    }

    /// Enrich, filter and write a note on the caller's task, bypassing the queue
    ///
    /// A transient failure still falls back to the scheduler's retry path.
    pub async fn index_immediately(&self, mut note: NoteDocument) -> bool {
        self.prepare(&mut note, IndexSource::Api);
        if let Err(reason) = self.policy.evaluate(&note) {
            self.record_skip(&note.id, &reason);
            return false;
        }
        let task = IndexingTask::new(IndexingOperation::Create, note, None, Utc::now());
        self.ctx.process_batch(vec![task]).await == 0
    }

    /// Re-index an edited note; a note that became hidden is deleted instead
    pub fn update_note(&self, note: NoteDocument, priority: Option<i32>) -> bool {
        if !note.visibility.is_indexable() {
            return self.delete_hidden(note);
        }
        self.admit(IndexingOperation::Update, note, priority, IndexSource::Realtime)
            == Submission::Queued
    }

    fn delete_hidden(&self, note: NoteDocument) -> bool {
        debug!(
            note_id = %note.id,
            visibility = ?note.visibility,
            "Note is no longer visible, deleting"
        );
        self.enqueue(IndexingTask::new(
            IndexingOperation::Delete,
            note,
            Some(DELETE_PRIORITY),
            Utc::now(),
        ))
    }

    /// Refresh the engagement scores of an already indexed note
    ///
    /// A note that became hidden is deleted instead.
    pub fn update_note_metrics(&self, mut note: NoteDocument) -> bool {
        if note.id.trim().is_empty() {
            self.record_skip("", &SkipReason::Invalid(ValidationError::MissingField("id")));
            return false;
        }
        if !note.visibility.is_indexable() {
            return self.delete_hidden(note);
        }
        let started = Instant::now();
        note.recompute_scores(Utc::now());
        self.ctx
            .stats
            .record_preparation(Duration::ZERO, started.elapsed());
        self.enqueue(IndexingTask::new(
            IndexingOperation::UpdateMetrics,
            note,
            None,
            Utc::now(),
        ))
    }

    /// Remove a note by id without shard routing
    pub fn delete_note(&self, note_id: &str) -> bool {
        self.delete_authored_note(note_id, "")
    }

    /// Remove a note, routed to its author's shard
    pub fn delete_authored_note(&self, note_id: &str, user_id: &str) -> bool {
        if note_id.trim().is_empty() {
            return false;
        }
        let note = NoteDocument {
            id: note_id.to_string(),
            user_id: user_id.to_string(),
            ..NoteDocument::default()
        };
        self.enqueue(IndexingTask::new(
            IndexingOperation::Delete,
            note,
            Some(DELETE_PRIORITY),
            Utc::now(),
        ))
    }

    /// Queue many notes; returns how many were accepted
    pub fn index_batch(&self, notes: Vec<NoteDocument>) -> usize {
        let total = notes.len();
        let accepted = notes
            .into_iter()
            .map(|note| self.admit(IndexingOperation::Create, note, None, IndexSource::Bulk))
            .filter(|outcome| *outcome == Submission::Queued)
            .count();
        info!(total, accepted, "Note batch submitted");
        accepted
    }

    /// Load a backlog of notes, waiting out queue pressure between admissions
    ///
    /// `progress` receives the completed fraction after every chunk of
    /// `batch_size` notes. Returns how many notes were accepted.
    pub async fn index_historical<F>(&self, notes: Vec<NoteDocument>, mut progress: F) -> usize
    where
        F: FnMut(f32),
    {
        let total = notes.len();
        if total == 0 {
            progress(1.0);
            return 0;
        }

        let chunk_size = self.config.batch_size().max(1);
        let mut accepted = 0;
        let mut processed = 0;
        let mut pending = notes.into_iter().peekable();

        while pending.peek().is_some() {
            for note in pending.by_ref().take(chunk_size) {
                if self.admit_with_backpressure(note).await {
                    accepted += 1;
                }
                processed += 1;
            }
            progress(processed as f32 / total as f32);
            if !self.is_running() {
                break;
            }
        }

        info!(total, accepted, "Historical note load submitted");
        accepted
    }

    async fn admit_with_backpressure(&self, note: NoteDocument) -> bool {
        let mut note = note;
        self.prepare(&mut note, IndexSource::Migration);
        if let Err(reason) = self.policy.evaluate(&note) {
            self.record_skip(&note.id, &reason);
            return false;
        }

        let note_id = note.id.clone();
        let mut task = IndexingTask::new(IndexingOperation::Create, note, None, Utc::now());
        for _ in 0..HISTORICAL_ADMISSION_ATTEMPTS {
            match self.ctx.scheduler.try_push(task.clone()) {
                Admission::Accepted => return true,
                Admission::Rejected(RejectReason::NotRunning) => break,
                Admission::Rejected(_) => {
                    tokio::time::sleep(self.config.batch_timeout()).await;
                    task.queued_at = Utc::now();
                }
            }
        }
        self.ctx.stats.record_rejection();
        warn!(note_id = %note_id, "Historical note could not be admitted");
        false
    }

    /// Execute everything queued right now on the caller's task
    ///
    /// Delayed retries are included. Returns how many tasks were executed.
    pub async fn flush_queue(&self) -> usize {
        let tasks = self.ctx.scheduler.drain_all();
        let total = tasks.len();
        if total == 0 {
            return 0;
        }

        let mut pending = tasks.into_iter().peekable();
        let mut failures = 0;
        while pending.peek().is_some() {
            let batch: Vec<_> = pending.by_ref().take(self.config.batch_size()).collect();
            failures += self.ctx.process_batch(batch).await;
        }
        info!(total, failures, "Indexing queue flushed");
        total
    }

    /// Drop every queued task; returns how many were dropped
    pub fn clear_queue(&self) -> usize {
        let dropped = self.ctx.scheduler.clear();
        if dropped > 0 {
            warn!(dropped, "Indexing queue cleared");
        }
        dropped
    }

    pub fn pause(&self) {
        if !self.ctx.paused.swap(true, Ordering::AcqRel) {
            info!("Note indexer paused");
        }
    }

    pub fn resume(&self) {
        if self.ctx.paused.swap(false, Ordering::AcqRel) {
            info!("Note indexer resumed");
        }
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.ctx.is_paused()
    }

    #[must_use]
    pub fn queue_size(&self) -> usize {
        self.ctx.scheduler.len()
    }

    #[must_use]
    pub fn metrics(&self) -> IndexingMetricsSnapshot {
        self.ctx.stats.snapshot()
    }

    pub fn reset_metrics(&self) {
        self.ctx.stats.reset();
    }

    /// Dead-lettered tasks, most recent first
    #[must_use]
    pub fn failed_operations(&self, limit: usize) -> Vec<FailedOperation> {
        self.ctx.failed_log.recent(limit)
    }

    #[must_use]
    pub fn status(&self) -> IndexerStatus {
        IndexerStatus {
            running: self.is_running(),
            ready: self.ctx.backend.is_ready(),
            paused: self.is_paused(),
            active_workers: self.ctx.stats.active_workers(),
            queue_size: self.queue_size(),
            memory_usage_bytes: self.ctx.scheduler.memory_usage_bytes(),
        }
    }

    /// Running, backend ready and below the memory limit
    #[must_use]
    pub fn health_check(&self) -> bool {
        let status = self.status();
        let healthy =
            status.running && status.ready && !self.ctx.scheduler.is_memory_critical();
        if !healthy {
            debug!(?status, "Note indexer unhealthy");
        }
        healthy
    }

    #[must_use]
    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    #[must_use]
    pub fn backend(&self) -> &Arc<B> {
        &self.ctx.backend
    }

    #[must_use]
    pub fn analyzer(&self) -> &ContentAnalyzer {
        &self.analyzer
    }

    /// Run content analysis and scoring, recording how long each took
    fn prepare(&self, note: &mut NoteDocument, source: IndexSource) {
        let now = Utc::now();

        let started = Instant::now();
        let analysis = self.analyzer.analyze(&note.content);
        note.apply_analysis(analysis);
        let analysis_time = started.elapsed();

        let started = Instant::now();
        note.recompute_scores(now);
        let scoring_time = started.elapsed();

        note.indexing_metadata.source = source;
        note.indexing_metadata.version = note.indexing_metadata.version.saturating_add(1);
        self.ctx
            .stats
            .record_preparation(analysis_time, scoring_time);
    }

    fn admit(
        &self,
        operation: IndexingOperation,
        mut note: NoteDocument,
        priority: Option<i32>,
        source: IndexSource,
    ) -> Submission {
        self.prepare(&mut note, source);
        if let Err(reason) = self.policy.evaluate(&note) {
            self.record_skip(&note.id, &reason);
            return Submission::Skipped;
        }
        let task = IndexingTask::new(operation, note, priority, Utc::now());
        match self.push(task) {
            Ok(()) => Submission::Queued,
            Err(_) => Submission::Rejected,
        }
    }

    fn enqueue(&self, task: IndexingTask) -> bool {
        self.push(task).is_ok()
    }

    fn push(&self, task: IndexingTask) -> Result<(), RejectReason> {
        let note_id = task.note.id.clone();
        let operation = task.operation;
        match self.ctx.scheduler.try_push(task) {
            Admission::Accepted => {
                debug!(note_id = %note_id, operation = operation.as_str(), "Indexing task queued");
                Ok(())
            }
            Admission::Rejected(reason) => {
                self.ctx.stats.record_rejection();
                warn!(
                    note_id = %note_id,
                    operation = operation.as_str(),
                    reason = %reason,
                    "Indexing task rejected"
                );
                Err(reason)
            }
        }
    }

    fn record_skip(&self, note_id: &str, reason: &SkipReason) {
        self.ctx.stats.record_skip();
        debug!(note_id = %note_id, reason = %reason, "Note skipped");
    }
}

impl<B: IndexBackend> Drop for NoteIndexer<B> {
    fn drop(&mut self) {
        self.ctx.scheduler.stop();
    }
}
