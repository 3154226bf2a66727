//! Near-real-time indexing pipeline
//!
//! Notes enter through `NoteIndexer`, are enriched and filtered, then wait in
//! the priority `TaskScheduler` until a worker from the `WorkerPool` writes
//! them to an `IndexBackend`. Transient failures are retried with jittered
//! exponential backoff; everything else ends in the `FailedOperationLog`.

pub mod failed_log;
pub mod policy;
pub mod scheduler;
pub mod service;
pub mod stats;
pub mod task;
pub mod worker;

pub use failed_log::{FailedOperation, FailedOperationLog};
pub use policy::{IndexingPolicy, SkipReason};
pub use scheduler::{Admission, RejectReason, RetryRefused, SchedulerLimits, TaskScheduler};
pub use service::{IndexerStatus, NoteIndexer};
pub use stats::{IndexingMetricsSnapshot, IndexingStats};
pub use task::{DELETE_PRIORITY, IndexingOperation, IndexingTask, JITTER_MAX, JITTER_MIN};
pub use worker::WorkerPool;
