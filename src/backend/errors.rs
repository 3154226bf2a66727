//! Error types for search backend operations
//!
//! Every backend call returns `BackendResult`. The client never retries on its
//! own; callers use `is_transient` to decide whether a failure is worth
//! another attempt.

use thiserror::Error;

use crate::config::ConfigError;

/// Result type alias for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

#[derive(Debug, Error)]
pub enum BackendError {
    /// Connection, TLS or timeout failure below HTTP
    #[error("Search backend request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend answered with a non-success status
    #[error("Search backend returned {status} for {operation}: {body}")]
    Status {
        operation: String,
        status: u16,
        body: String,
    },

    /// A request body could not be encoded or a response body decoded
    #[error("Search backend JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Cluster health reported red or could not be established
    #[error("Search backend cluster is unavailable (status: {0})")]
    ClusterUnavailable(String),

    /// The client was shut down or never initialized
    #[error("Search backend client is not ready")]
    NotReady,

    /// The backend rejected one item of an otherwise delivered bulk request
    #[error("Bulk item {id} rejected with {status}: {reason}")]
    BulkItemRejected {
        id: String,
        status: u16,
        reason: String,
    },

    /// The bulk request carrying an operation never got a usable answer
    #[error("Bulk request failed: {0}")]
    BulkRequestFailed(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Other(String),
}

impl BackendError {
    /// Check if the failure is worth retrying
    ///
    /// Transport errors, timeouts, 408, 429 and 5xx are transient; any other
    /// 4xx means the request itself is wrong and will fail again.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            BackendError::Transport(_)
            | BackendError::ClusterUnavailable(_)
            | BackendError::NotReady
            | BackendError::BulkRequestFailed(_) => true,
            BackendError::Status { status, .. } | BackendError::BulkItemRejected { status, .. } => {
                matches!(*status, 408 | 429) || *status >= 500
            }
            BackendError::Json(_) | BackendError::Config(_) | BackendError::Other(_) => false,
        }
    }

    /// The same failure for one of many operations that shared a request
    ///
    /// Errors that cannot be cloned keep their message and transience.
    #[must_use]
    pub fn for_operation(&self) -> BackendError {
        match self {
            BackendError::Status {
                operation,
                status,
                body,
            } => BackendError::Status {
                operation: operation.clone(),
                status: *status,
                body: body.clone(),
            },
            BackendError::BulkItemRejected { id, status, reason } => {
                BackendError::BulkItemRejected {
                    id: id.clone(),
                    status: *status,
                    reason: reason.clone(),
                }
            }
            BackendError::ClusterUnavailable(status) => {
                BackendError::ClusterUnavailable(status.clone())
            }
            BackendError::NotReady => BackendError::NotReady,
            BackendError::Transport(e) => BackendError::BulkRequestFailed(e.to_string()),
            BackendError::BulkRequestFailed(reason) => {
                BackendError::BulkRequestFailed(reason.clone())
            }
            other => BackendError::Other(other.to_string()),
        }
    }

    /// HTTP status when the backend answered at all
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Status { status, .. }
            | BackendError::BulkItemRejected { status, .. } => Some(*status),
            BackendError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
