//! Search backend client
//!
//! `SearchBackendClient` speaks the Elasticsearch-compatible HTTP API: single
//! document writes, a buffered bulk path with a background flush loop, a TTL
//! read cache, cluster-health readiness gating and slow-operation tracking.
//!
//! The indexing pipeline only depends on the `IndexBackend` trait so that the
//! worker pool can run against any write target.

pub mod bulk;
pub mod cache;
pub mod client;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod slow_log;

use std::future::Future;

use serde_json::Value;

pub use bulk::{
    BulkAction, BulkItemFailure, BulkOperation, BulkReceipt, BulkResponse, BulkSummary,
    encode_bulk_body,
};
pub use cache::{CacheStats, QueryCache, fingerprint};
pub use client::SearchBackendClient;
pub use errors::{BackendError, BackendResult};
pub use health::{ClusterHealth, HealthStatus};
pub use metrics::{BackendMetrics, BackendMetricsSnapshot};
pub use slow_log::{SlowOperation, SlowOperationLog};

/// Write-path contract used by the worker pool
pub trait IndexBackend: Send + Sync + 'static {
    /// Name of the index notes are written to
    fn notes_index(&self) -> &str;

    /// Whether the backend currently accepts writes
    fn is_ready(&self) -> bool;

    /// Create or replace a full document
    fn index_note(
        &self,
        id: &str,
        routing: &str,
        document: &Value,
    ) -> impl Future<Output = BackendResult<()>> + Send;

    /// Merge `partial` into an existing document
    fn update_note_metrics(
        &self,
        id: &str,
        routing: &str,
        partial: &Value,
    ) -> impl Future<Output = BackendResult<()>> + Send;

    /// Remove a document; a missing document is not an error
    fn delete_note(&self, id: &str, routing: &str)
    -> impl Future<Output = BackendResult<()>> + Send;

    /// Hand an operation to the bulk buffer; the receipt reports its outcome
    fn submit_bulk_operation(&self, operation: BulkOperation) -> BackendResult<BulkReceipt>;
}

#[cfg(test)]
mod tests;
