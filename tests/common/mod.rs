//! Shared fixtures for the integration tests

use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use mockito::{Mock, Server, ServerGuard};
use note_indexer::config::{BackendConfigBuilder, WithHosts};
use note_indexer::{BackendConfig, NoteDocument, SearchBackendClient};
use serde_json::json;
use tracing_subscriber::EnvFilter;

/// Long enough to read, short enough for the quality bonus band
#[allow(dead_code)]
pub const NOTE_TEXT: &str = "Shipping a new release of the indexer today with faster batch writes";

/// Routes library logs through the test harness; honours `RUST_LOG`
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Starts a mock search backend
#[allow(dead_code)]
pub async fn setup_mock_server() -> ServerGuard {
    init_tracing();
    Server::new_async().await
}

/// Backend configuration pointed at the mock server
///
/// The flush interval is long so that only explicit flushes or a full
/// buffer send bulk requests.
#[allow(dead_code)]
pub fn backend_config(server: &Server) -> BackendConfigBuilder<WithHosts> {
    BackendConfigBuilder::from_preset(BackendConfig::testing())
        .host(server.url())
        .bulk_flush_interval(Duration::from_secs(60))
}

/// Mocks `GET /_cluster/health` with the given status
#[allow(dead_code)]
pub async fn create_health_mock(server: &mut Server, status: &str) -> Mock {
    server
        .mock("GET", "/_cluster/health")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "cluster_name": "test-cluster",
                "status": status,
                "number_of_nodes": 1,
                "active_shards": 1,
                "unassigned_shards": 0
            })
            .to_string(),
        )
        .create_async()
        .await
}

/// Mocks `PUT /notes` answering that the index was created
#[allow(dead_code)]
pub async fn create_index_mock(server: &mut Server) -> Mock {
    server
        .mock("PUT", "/notes")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"acknowledged":true,"index":"notes"}"#)
        .create_async()
        .await
}

/// Client that has passed `initialize()` against a green mock cluster
#[allow(dead_code)]
pub async fn ready_client(server: &mut Server) -> Result<SearchBackendClient> {
    create_health_mock(server, "green").await;
    create_index_mock(server).await;
    let client = SearchBackendClient::new(backend_config(server).build()?)?;
    client.initialize().await?;
    Ok(client)
}

/// A fresh, indexable note
#[allow(dead_code)]
pub fn note(id: &str) -> NoteDocument {
    NoteDocument::new(id, "user-1", NOTE_TEXT, Utc::now())
}

/// Waits for a condition to be true with timeout
#[allow(dead_code)]
pub async fn wait_for_condition<F>(mut check: F, timeout: Duration) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
