#![recursion_limit = "256"]

pub mod analysis;
pub mod backend;
pub mod config;
pub mod document;
pub mod indexing;

pub use analysis::{AnalysisResult, ContentAnalyzer, QualityProfile, Sentiment};
pub use backend::{
    BackendError, BackendMetricsSnapshot, BackendResult, BulkOperation, ClusterHealth,
    HealthStatus, IndexBackend, SearchBackendClient, SlowOperation,
};
pub use config::{BackendConfig, ConfigError, IndexerConfig};
pub use document::{
    AuthorMetrics, EngagementMetrics, IndexSource, NoteDocument, ValidationError,
    VerificationLevel, Visibility,
};
pub use indexing::{
    FailedOperation, IndexerStatus, IndexingMetricsSnapshot, IndexingOperation, IndexingTask,
    NoteIndexer,
};
