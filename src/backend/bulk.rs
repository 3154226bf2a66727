//! Bulk write operations and the pending-operation buffer
//!
//! Operations are encoded as newline-delimited JSON: one action line naming
//! the index and id, followed by a document line for `index` and `update`.
//! Every buffered operation can carry a completion channel which the flush
//! loop settles with that operation's own outcome.

use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tokio::sync::{Notify, oneshot};

use super::errors::{BackendError, BackendResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BulkAction {
    Index,
    Update,
    Delete,
}

impl BulkAction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            BulkAction::Index => "index",
            BulkAction::Update => "update",
            BulkAction::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BulkOperation {
    pub action: BulkAction,
    pub index: String,
    pub id: String,
    pub routing: Option<String>,
    pub document: Option<Value>,
}

impl BulkOperation {
    #[must_use]
    pub fn index(index: impl Into<String>, id: impl Into<String>, document: Value) -> Self {
        Self {
            action: BulkAction::Index,
            index: index.into(),
            id: id.into(),
            routing: None,
            document: Some(document),
        }
    }

    /// Partial update; `document` holds only the changed fields
    #[must_use]
    pub fn update(index: impl Into<String>, id: impl Into<String>, document: Value) -> Self {
        Self {
            action: BulkAction::Update,
            index: index.into(),
            id: id.into(),
            routing: None,
            document: Some(document),
        }
    }

    #[must_use]
    pub fn delete(index: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            action: BulkAction::Delete,
            index: index.into(),
            id: id.into(),
            routing: None,
            document: None,
        }
    }

    #[must_use]
    pub fn with_routing(mut self, routing: impl Into<String>) -> Self {
        let routing = routing.into();
        self.routing = (!routing.is_empty()).then_some(routing);
        self
    }

    /// Append this operation's NDJSON lines to `out`
    pub fn write_ndjson(&self, out: &mut String) {
        let mut meta = Map::new();
        meta.insert("_index".into(), Value::String(self.index.clone()));
        meta.insert("_id".into(), Value::String(self.id.clone()));
        if let Some(routing) = &self.routing {
            meta.insert("routing".into(), Value::String(routing.clone()));
        }
        let mut action = Map::new();
        action.insert(self.action.as_str().into(), Value::Object(meta));
        out.push_str(&Value::Object(action).to_string());
        out.push('\n');

        match (self.action, &self.document) {
            (BulkAction::Index, Some(doc)) => {
                out.push_str(&doc.to_string());
                out.push('\n');
            }
            (BulkAction::Update, Some(doc)) => {
                out.push_str(&json!({ "doc": doc }).to_string());
                out.push('\n');
            }
            _ => {}
        }
    }
}

/// Encode a batch as a `_bulk` request body (trailing newline included)
#[must_use]
pub fn encode_bulk_body(operations: &[BulkOperation]) -> String {
    let mut body = String::with_capacity(operations.len() * 256);
    for op in operations {
        op.write_ndjson(&mut body);
    }
    body
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkResponse {
    #[serde(default)]
    pub took: u64,
    #[serde(default)]
    pub errors: bool,
    #[serde(default)]
    pub items: Vec<Value>,
}

/// One item the backend refused inside a delivered bulk request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkItemFailure {
    /// Position of the operation in the request
    pub position: usize,
    pub id: String,
    pub status: u16,
    pub reason: String,
}

impl BulkItemFailure {
    #[must_use]
    pub fn to_error(&self) -> BackendError {
        BackendError::BulkItemRejected {
            id: self.id.clone(),
            status: self.status,
            reason: self.reason.clone(),
        }
    }
}

impl BulkResponse {
    /// Items whose action result carries an `error` object
    #[must_use]
    pub fn item_failures(&self) -> Vec<BulkItemFailure> {
        if !self.errors {
            return Vec::new();
        }
        self.items
            .iter()
            .enumerate()
            .filter_map(|(position, item)| {
                let result = item.as_object()?.values().next()?;
                let error = result.get("error")?;
                let reason = match error {
                    Value::String(text) => text.clone(),
                    other => other
                        .get("reason")
                        .and_then(Value::as_str)
                        .or_else(|| other.get("type").and_then(Value::as_str))
                        .map_or_else(|| other.to_string(), str::to_string),
                };
                Some(BulkItemFailure {
                    position,
                    id: result
                        .get("_id")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    status: result
                        .get("status")
                        .and_then(Value::as_u64)
                        .and_then(|s| u16::try_from(s).ok())
                        .unwrap_or(500),
                    reason,
                })
            })
            .collect()
    }

    #[must_use]
    pub fn failed_items(&self) -> usize {
        self.item_failures().len()
    }
}

/// Outcome of one bulk request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkSummary {
    pub total: usize,
    pub failed: usize,
    pub rejected: Vec<BulkItemFailure>,
}

/// Resolves once the flush loop has sent the operation it was issued for
#[derive(Debug)]
pub struct BulkReceipt {
    rx: oneshot::Receiver<BackendResult<()>>,
}

impl BulkReceipt {
    /// Sender half for whoever delivers the operation, and the receipt
    #[must_use]
    pub fn channel() -> (oneshot::Sender<BackendResult<()>>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }

    /// A receipt that is already settled
    #[must_use]
    pub fn ready(result: BackendResult<()>) -> Self {
        let (tx, receipt) = Self::channel();
        let _ = tx.send(result);
        receipt
    }

    /// Outcome of the operation; a dropped buffer counts as a failed request
    pub async fn wait(self) -> BackendResult<()> {
        self.rx.await.unwrap_or_else(|_| {
            Err(BackendError::BulkRequestFailed(
                "bulk operation dropped before it was sent".to_string(),
            ))
        })
    }
}

pub(crate) type BulkAck = oneshot::Sender<BackendResult<()>>;

pub(crate) struct PendingOperation {
    pub(crate) operation: BulkOperation,
    pub(crate) ack: Option<BulkAck>,
}

/// Buffer of operations awaiting the flush loop
pub(crate) struct BulkQueue {
    pending: Mutex<Vec<PendingOperation>>,
    pub(crate) notify: Notify,
    batch_size: usize,
}

impl BulkQueue {
    pub(crate) fn new(batch_size: usize) -> Self {
        Self {
            pending: Mutex::new(Vec::with_capacity(batch_size)),
            notify: Notify::new(),
            batch_size: batch_size.max(1),
        }
    }

    /// Append and wake the flush loop once a full batch is waiting
    pub(crate) fn push(&self, operation: BulkOperation, ack: Option<BulkAck>) {
        let full = {
            let mut pending = self.pending.lock();
            pending.push(PendingOperation { operation, ack });
            pending.len() >= self.batch_size
        };
        if full {
            self.notify.notify_one();
        }
    }

    /// Take up to one batch from the front of the buffer
    pub(crate) fn take_batch(&self) -> Option<Vec<PendingOperation>> {
        let mut pending = self.pending.lock();
        if pending.is_empty() {
            return None;
        }
        let n = pending.len().min(self.batch_size);
        Some(pending.drain(..n).collect())
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.lock().len()
    }
}
