//! HTTP client for the search backend
//!
//! One `reqwest::Client` is shared by every call. Hosts are used round-robin.
//! Each request is timed; latency feeds the metrics and, past the configured
//! threshold, the slow-operation log. Bulk operations are buffered and sent by
//! a background flush loop which must be stopped with `shutdown()`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::{Value, json};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::{BackendConfig, ConfigError};

use super::IndexBackend;
use super::bulk::{
    BulkOperation, BulkQueue, BulkReceipt, BulkResponse, BulkSummary, PendingOperation,
    encode_bulk_body,
};
use super::cache::{CacheStats, QueryCache, fingerprint};
use super::errors::{BackendError, BackendResult};
use super::health::{ClusterHealth, notes_index_definition};
use super::metrics::{BackendMetrics, BackendMetricsSnapshot};
use super::slow_log::{SlowOperation, SlowOperationLog};

const MAX_ERROR_BODY_CHARS: usize = 512;

enum RequestBody<'a> {
    Empty,
    Json(&'a Value),
    Ndjson(String),
}

struct BulkProcessor {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

struct ClientInner {
    http: reqwest::Client,
    config: BackendConfig,
    next_host: AtomicUsize,
    ready: AtomicBool,
    accepting_bulk: AtomicBool,
    cache: QueryCache,
    slow_log: SlowOperationLog,
    metrics: BackendMetrics,
    bulk: BulkQueue,
    processor: Mutex<Option<BulkProcessor>>,
}

/// Cheaply cloneable handle to the search backend
#[derive(Clone)]
pub struct SearchBackendClient {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for SearchBackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchBackendClient")
            .field("hosts", &self.inner.config.hosts())
            .field("index", &self.inner.config.notes_index())
            .field("ready", &self.is_ready())
            .finish()
    }
}

fn truncate_body(body: String) -> String {
    if body.chars().count() <= MAX_ERROR_BODY_CHARS {
        return body;
    }
    body.chars().take(MAX_ERROR_BODY_CHARS).collect::<String>() + "…"
}

fn default_headers(config: &BackendConfig) -> Result<HeaderMap, ConfigError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(key) = &config.api_key {
        let mut value = HeaderValue::from_str(&format!("ApiKey {key}"))
            .map_err(|e| ConfigError::invalid("api_key", e.to_string()))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }
    Ok(headers)
}

impl SearchBackendClient {
    /// Validate `config` and build the HTTP client; no network traffic yet
    pub fn new(config: BackendConfig) -> BackendResult<Self> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .connect_timeout(config.connection_timeout())
            .timeout(config.request_timeout())
            .default_headers(default_headers(&config)?)
            .build()?;

        let inner = ClientInner {
            http,
            next_host: AtomicUsize::new(0),
            ready: AtomicBool::new(false),
            accepting_bulk: AtomicBool::new(false),
            cache: QueryCache::new(config.cache_capacity(), config.cache_ttl()),
            slow_log: SlowOperationLog::new(config.slow_log_capacity()),
            metrics: BackendMetrics::new(),
            bulk: BulkQueue::new(config.bulk_batch_size()),
            processor: Mutex::new(None),
            config,
        };
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    #[must_use]
    pub fn config(&self) -> &BackendConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::Acquire)
    }

    fn ensure_ready(&self) -> BackendResult<()> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(BackendError::NotReady)
        }
    }

    fn base_url(&self) -> &str {
        let hosts = self.inner.config.hosts();
        let i = self.inner.next_host.fetch_add(1, Ordering::Relaxed) % hosts.len();
        hosts[i].trim_end_matches('/')
    }

    fn index_path(&self) -> String {
        format!("/{}", urlencoding::encode(self.inner.config.notes_index()))
    }

    fn document_path(&self, endpoint: &str, id: &str, routing: &str) -> String {
        let mut path = format!(
            "{}/{endpoint}/{}",
            self.index_path(),
            urlencoding::encode(id)
        );
        if !routing.is_empty() {
            path.push_str("?routing=");
            path.push_str(&urlencoding::encode(routing));
        }
        path
    }

    fn track_latency(&self, operation: &str, target: &str, elapsed: Duration) {
        if elapsed >= self.inner.config.slow_operation_threshold() {
            self.inner.slow_log.record(operation, target, elapsed);
            self.inner.metrics.record_slow_operation();
            warn!(
                operation,
                target,
                elapsed_ms = elapsed.as_millis() as u64,
                "Slow search backend operation"
            );
        }
    }

    /// Send one request; statuses in `accept` are returned instead of failing
    async fn execute(
        &self,
        operation: &str,
        method: Method,
        path: &str,
        body: RequestBody<'_>,
        accept: &[u16],
    ) -> BackendResult<(u16, Value)> {
        let config = &self.inner.config;
        let url = format!("{}{path}", self.base_url());
        let mut request = self.inner.http.request(method, &url);
        if let (None, Some(user)) = (&config.api_key, &config.username) {
            request = request.basic_auth(user, config.password.as_ref());
        }
        request = match body {
            RequestBody::Empty => request,
            RequestBody::Json(value) => request.json(value),
            RequestBody::Ndjson(text) => request
                .header(CONTENT_TYPE, "application/x-ndjson")
                .body(text),
        };

        let started = Instant::now();
        let outcome = async {
            let response = request.send().await?;
            let status = response.status().as_u16();
            let text = response.text().await?;
            Ok::<_, BackendError>((status, text))
        }
        .await;
        let elapsed = started.elapsed();
        self.track_latency(operation, path, elapsed);

        let (status, text) = match outcome {
            Ok(parts) => parts,
            Err(e) => {
                self.inner.metrics.record_request(false, elapsed);
                debug!(operation, path, error = %e, "Search backend transport failure");
                return Err(e);
            }
        };

        let success = (200..300).contains(&status);
        let accepted = success || accept.contains(&status);
        self.inner.metrics.record_request(accepted, elapsed);
        if !accepted {
            return Err(BackendError::Status {
                operation: format!("{operation} {path}"),
                status,
                body: truncate_body(text),
            });
        }

        let value = if text.trim().is_empty() {
            Value::Null
        } else if success {
            serde_json::from_str(&text)?
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        Ok((status, value))
    }

    /// `GET /_cluster/health`
    pub async fn cluster_health(&self) -> BackendResult<ClusterHealth> {
        let (_, body) = self
            .execute(
                "cluster_health",
                Method::GET,
                "/_cluster/health",
                RequestBody::Empty,
                &[],
            )
            .await?;
        Ok(serde_json::from_value(body)?)
    }

    /// Create the notes index unless it already exists
    pub async fn ensure_index(&self) -> BackendResult<()> {
        let config = &self.inner.config;
        let definition = notes_index_definition(config.number_of_shards, config.number_of_replicas);
        let path = self.index_path();
        let (status, body) = self
            .execute(
                "create_index",
                Method::PUT,
                &path,
                RequestBody::Json(&definition),
                &[400],
            )
            .await?;

        if status == 400 {
            let text = body.to_string();
            if !text.contains("resource_already_exists") {
                return Err(BackendError::Status {
                    operation: format!("create_index {path}"),
                    status,
                    body: truncate_body(text),
                });
            }
            debug!(index = config.notes_index(), "Notes index already exists");
        } else {
            info!(index = config.notes_index(), "Created notes index");
        }
        Ok(())
    }

    /// Check cluster health, create the index and start the bulk flush loop
    ///
    /// A red (or unreadable) cluster leaves the client not ready.
    pub async fn initialize(&self) -> BackendResult<ClusterHealth> {
        let health = match self.cluster_health().await {
            Ok(health) => health,
            Err(e) => {
                self.inner.ready.store(false, Ordering::Release);
                return Err(e);
            }
        };
        if !health.status.is_available() {
            self.inner.ready.store(false, Ordering::Release);
            warn!(
                cluster = %health.cluster_name,
                status = health.status.as_str(),
                "Search backend cluster unavailable"
            );
            return Err(BackendError::ClusterUnavailable(
                health.status.as_str().to_string(),
            ));
        }

        if self.inner.config.create_index_on_startup() {
            self.ensure_index().await?;
        }

        self.inner.accepting_bulk.store(true, Ordering::Release);
        self.inner.ready.store(true, Ordering::Release);
        self.start_bulk_processor();
        info!(
            cluster = %health.cluster_name,
            status = health.status.as_str(),
            nodes = health.number_of_nodes,
            "Search backend ready"
        );
        Ok(health)
    }

    /// `PUT /{index}/_doc/{id}`
    pub async fn index_note(&self, id: &str, routing: &str, document: &Value) -> BackendResult<()> {
        self.ensure_ready()?;
        let path = self.document_path("_doc", id, routing);
        let (_, body) = self
            .execute("index_note", Method::PUT, &path, RequestBody::Json(document), &[])
            .await?;
        match body.get("result").and_then(Value::as_str) {
            None | Some("created" | "updated" | "noop") => Ok(()),
            Some(other) => Err(BackendError::Other(format!(
                "unexpected index result '{other}' for note {id}"
            ))),
        }
    }

    /// `POST /{index}/_update/{id}` with `{"doc": partial}`
    pub async fn update_note_metrics(
        &self,
        id: &str,
        routing: &str,
        partial: &Value,
    ) -> BackendResult<()> {
        self.ensure_ready()?;
        let path = self.document_path("_update", id, routing);
        let body = json!({ "doc": partial });
        self.execute(
            "update_note_metrics",
            Method::POST,
            &path,
            RequestBody::Json(&body),
            &[],
        )
        .await?;
        Ok(())
    }

    /// `DELETE /{index}/_doc/{id}`; 404 means already gone
    pub async fn delete_note(&self, id: &str, routing: &str) -> BackendResult<()> {
        self.ensure_ready()?;
        let path = self.document_path("_doc", id, routing);
        let (status, _) = self
            .execute("delete_note", Method::DELETE, &path, RequestBody::Empty, &[404])
            .await?;
        if status == 404 {
            debug!(note_id = id, "Delete of missing note treated as success");
        }
        Ok(())
    }

    /// `POST /_bulk` with an NDJSON body
    ///
    /// A delivered request succeeds even when some items were rejected; the
    /// summary lists them.
    pub async fn bulk_execute(&self, operations: &[BulkOperation]) -> BackendResult<BulkSummary> {
        self.ensure_ready()?;
        if operations.is_empty() {
            return Ok(BulkSummary::default());
        }
        let body = encode_bulk_body(operations);
        let (_, value) = self
            .execute("bulk", Method::POST, "/_bulk", RequestBody::Ndjson(body), &[])
            .await?;
        let response: BulkResponse = serde_json::from_value(value)?;
        let rejected = response.item_failures();
        let failed = rejected.len();
        self.inner
            .metrics
            .record_bulk_flush(operations.len(), failed);
        if failed > 0 {
            warn!(
                failed,
                total = operations.len(),
                "Bulk request rejected some items"
            );
        } else {
            debug!(total = operations.len(), took_ms = response.took, "Bulk request complete");
        }
        Ok(BulkSummary {
            total: operations.len(),
            failed,
            rejected,
        })
    }

    /// Buffer an operation for the flush loop without tracking its outcome
    pub fn queue_bulk_operation(&self, operation: BulkOperation) -> BackendResult<()> {
        if !self.inner.accepting_bulk.load(Ordering::Acquire) {
            return Err(BackendError::NotReady);
        }
        self.inner.bulk.push(operation, None);
        Ok(())
    }

    /// Buffer an operation; the receipt resolves with its own outcome
    pub fn submit_bulk_operation(&self, operation: BulkOperation) -> BackendResult<BulkReceipt> {
        if !self.inner.accepting_bulk.load(Ordering::Acquire) {
            return Err(BackendError::NotReady);
        }
        let (ack, receipt) = BulkReceipt::channel();
        self.inner.bulk.push(operation, Some(ack));
        Ok(receipt)
    }

    #[must_use]
    pub fn pending_bulk_operations(&self) -> usize {
        self.inner.bulk.len()
    }

    /// Send everything buffered now; returns how many operations were sent
    ///
    /// Every batch is attempted. A batch that fails to send is dropped,
    /// counted as failed and its operations are told why. The first such
    /// error is returned once the buffer is empty.
    pub async fn flush_bulk_queue(&self) -> BackendResult<usize> {
        let mut sent = 0;
        let mut first_error = None;
        while let Some(batch) = self.inner.bulk.take_batch() {
            let (operations, acks): (Vec<_>, Vec<_>) = batch
                .into_iter()
                .map(|PendingOperation { operation, ack }| (operation, ack))
                .unzip();
            match self.bulk_execute(&operations).await {
                Ok(summary) => {
                    sent += summary.total;
                    let mut rejected = summary.rejected.iter().peekable();
                    for (position, ack) in acks.into_iter().enumerate() {
                        let outcome = match rejected.next_if(|f| f.position == position) {
                            Some(failure) => Err(failure.to_error()),
                            None => Ok(()),
                        };
                        if let Some(ack) = ack {
                            let _ = ack.send(outcome);
                        }
                    }
                }
                Err(e) => {
                    self.inner.metrics.record_bulk_flush(0, operations.len());
                    error!(
                        dropped = operations.len(),
                        error = %e,
                        "Bulk flush failed"
                    );
                    for ack in acks.into_iter().flatten() {
                        let _ = ack.send(Err(e.for_operation()));
                    }
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(sent),
        }
    }

    /// Spawn the flush loop if it is not already running
    pub fn start_bulk_processor(&self) {
        let mut processor = self.inner.processor.lock();
        if processor.is_some() {
            return;
        }
        let (shutdown, rx) = watch::channel(false);
        let handle = tokio::spawn(self.clone().run_bulk_processor(rx));
        *processor = Some(BulkProcessor { shutdown, handle });
        debug!("Bulk processor started");
    }

    async fn run_bulk_processor(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.inner.config.bulk_flush_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                () = self.inner.bulk.notify.notified() => {}
                _ = ticker.tick() => {}
            }
            if self.inner.bulk.len() == 0 {
                continue;
            }
            if let Err(e) = self.flush_bulk_queue().await {
                error!(error = %e, "Bulk processor flush failed");
            }
        }
        debug!("Bulk processor stopped");
    }

    /// Stop the flush loop, send what is left and mark the client not ready
    pub async fn shutdown(&self) {
        self.inner.accepting_bulk.store(false, Ordering::Release);
        let processor = self.inner.processor.lock().take();
        if let Some(processor) = processor {
            let _ = processor.shutdown.send(true);
            if let Err(e) = processor.handle.await {
                error!(error = %e, "Bulk processor task failed");
            }
        }
        match self.flush_bulk_queue().await {
            Ok(0) => {}
            Ok(sent) => info!(sent, "Flushed remaining bulk operations"),
            Err(e) => error!(error = %e, "Final bulk flush failed"),
        }
        self.inner.ready.store(false, Ordering::Release);
        info!("Search backend client shut down");
    }

    /// Cached read: `POST /{index}/_search`
    pub async fn search(&self, index: &str, query: &Value) -> BackendResult<Value> {
        self.ensure_ready()?;
        if !self.inner.config.request_cache_enabled() {
            return self.search_uncached(index, query).await;
        }

        let key = fingerprint(index, query);
        if let Some(hit) = self.inner.cache.get(key, Instant::now()) {
            self.inner.metrics.record_cache_hit();
            debug!(index, "Search served from cache");
            return Ok(hit);
        }
        self.inner.metrics.record_cache_miss();

        let value = self.search_uncached(index, query).await?;
        self.inner.cache.insert(key, value.clone(), Instant::now());
        Ok(value)
    }

    async fn search_uncached(&self, index: &str, query: &Value) -> BackendResult<Value> {
        let path = format!("/{}/_search", urlencoding::encode(index));
        let (_, value) = self
            .execute("search", Method::POST, &path, RequestBody::Json(query), &[])
            .await?;
        Ok(value)
    }

    pub fn clear_cache(&self) {
        self.inner.cache.clear();
    }

    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.inner.cache.stats()
    }

    #[must_use]
    pub fn metrics(&self) -> BackendMetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    pub fn reset_metrics(&self) {
        self.inner.metrics.reset();
    }

    /// Most recent slow operations first
    #[must_use]
    pub fn slow_operations(&self, limit: usize) -> Vec<SlowOperation> {
        self.inner.slow_log.recent(limit)
    }
}

impl IndexBackend for SearchBackendClient {
    fn notes_index(&self) -> &str {
        self.inner.config.notes_index()
    }

    fn is_ready(&self) -> bool {
        SearchBackendClient::is_ready(self)
    }

    async fn index_note(&self, id: &str, routing: &str, document: &Value) -> BackendResult<()> {
        SearchBackendClient::index_note(self, id, routing, document).await
    }

    async fn update_note_metrics(
        &self,
        id: &str,
        routing: &str,
        partial: &Value,
    ) -> BackendResult<()> {
        SearchBackendClient::update_note_metrics(self, id, routing, partial).await
    }

    async fn delete_note(&self, id: &str, routing: &str) -> BackendResult<()> {
        SearchBackendClient::delete_note(self, id, routing).await
    }

    fn submit_bulk_operation(&self, operation: BulkOperation) -> BackendResult<BulkReceipt> {
        SearchBackendClient::submit_bulk_operation(self, operation)
    }
}
