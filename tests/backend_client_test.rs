mod common;

use std::time::Duration;

use anyhow::Result;
use mockito::Matcher;
use note_indexer::backend::BulkOperation;
use note_indexer::{BackendError, SearchBackendClient};
use serde_json::json;

use common::{backend_config, create_health_mock, create_index_mock, ready_client, setup_mock_server};

#[tokio::test]
async fn initialize_checks_health_and_creates_index() -> Result<()> {
    let mut server = setup_mock_server().await;
    let health = create_health_mock(&mut server, "yellow").await;
    let index = create_index_mock(&mut server).await;

    let client = SearchBackendClient::new(backend_config(&server).build()?)?;
    assert!(!client.is_ready());
    let cluster = client.initialize().await?;

    assert_eq!(cluster.cluster_name, "test-cluster");
    assert!(client.is_ready());
    health.assert_async().await;
    index.assert_async().await;

    client.shutdown().await;
    assert!(!client.is_ready());
    Ok(())
}

#[tokio::test]
async fn existing_index_is_not_an_error() -> Result<()> {
    let mut server = setup_mock_server().await;
    create_health_mock(&mut server, "green").await;
    server
        .mock("PUT", "/notes")
        .with_status(400)
        .with_body(
            json!({
                "error": { "type": "resource_already_exists_exception", "index": "notes" },
                "status": 400
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = SearchBackendClient::new(backend_config(&server).build()?)?;
    client.initialize().await?;
    assert!(client.is_ready());
    Ok(())
}

#[tokio::test]
async fn red_cluster_is_unavailable() -> Result<()> {
    let mut server = setup_mock_server().await;
    create_health_mock(&mut server, "red").await;
    let index = server.mock("PUT", "/notes").expect(0).create_async().await;

    let client = SearchBackendClient::new(backend_config(&server).build()?)?;
    let err = client.initialize().await.expect_err("red cluster");

    assert!(matches!(err, BackendError::ClusterUnavailable(ref s) if s == "red"));
    assert!(!client.is_ready());
    index.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn writes_need_an_initialized_client() -> Result<()> {
    let server = setup_mock_server().await;
    let client = SearchBackendClient::new(backend_config(&server).build()?)?;

    let err = client
        .index_note("n1", "user-1", &json!({ "id": "n1" }))
        .await
        .expect_err("not initialized");
    assert!(matches!(err, BackendError::NotReady));
    assert!(client.queue_bulk_operation(BulkOperation::delete("notes", "n1")).is_err());
    assert!(matches!(
        client.submit_bulk_operation(BulkOperation::delete("notes", "n1")),
        Err(BackendError::NotReady)
    ));
    assert!(matches!(client.bulk_execute(&[]).await, Err(BackendError::NotReady)));
    Ok(())
}

#[test]
fn invalid_host_is_rejected_up_front() {
    let config = note_indexer::BackendConfig::builder()
        .host("ftp://search.internal")
        .build();
    assert!(config.is_err());
}

#[tokio::test]
async fn index_note_puts_document_with_routing() -> Result<()> {
    let mut server = setup_mock_server().await;
    let client = ready_client(&mut server).await?;
    let put = server
        .mock("PUT", Matcher::Regex(r"^/notes/_doc/n1".to_string()))
        .match_query(Matcher::UrlEncoded("routing".into(), "user-1".into()))
        .match_body(Matcher::PartialJson(json!({ "id": "n1", "content": "hello" })))
        .with_status(201)
        .with_body(r#"{"_id":"n1","result":"created"}"#)
        .create_async()
        .await;

    client
        .index_note("n1", "user-1", &json!({ "id": "n1", "content": "hello" }))
        .await?;
    put.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn metrics_update_posts_partial_doc() -> Result<()> {
    let mut server = setup_mock_server().await;
    let client = ready_client(&mut server).await?;
    let update = server
        .mock("POST", Matcher::Regex(r"^/notes/_update/n1".to_string()))
        .match_body(Matcher::PartialJson(json!({ "doc": { "metrics": { "likes_count": 3 } } })))
        .with_status(200)
        .with_body(r#"{"result":"updated"}"#)
        .create_async()
        .await;

    client
        .update_note_metrics("n1", "user-1", &json!({ "metrics": { "likes_count": 3 } }))
        .await?;
    update.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn deleting_a_missing_note_succeeds() -> Result<()> {
    let mut server = setup_mock_server().await;
    let client = ready_client(&mut server).await?;
    server
        .mock("DELETE", Matcher::Regex(r"^/notes/_doc/gone".to_string()))
        .with_status(404)
        .with_body(r#"{"result":"not_found"}"#)
        .create_async()
        .await;

    client.delete_note("gone", "user-1").await?;
    Ok(())
}

#[tokio::test]
async fn server_errors_are_transient_client_errors_are_not() -> Result<()> {
    let mut server = setup_mock_server().await;
    let client = ready_client(&mut server).await?;
    server
        .mock("PUT", Matcher::Regex(r"^/notes/_doc/busy".to_string()))
        .with_status(503)
        .with_body("overloaded")
        .create_async()
        .await;
    server
        .mock("PUT", Matcher::Regex(r"^/notes/_doc/bad".to_string()))
        .with_status(400)
        .with_body(r#"{"error":{"type":"mapper_parsing_exception"}}"#)
        .create_async()
        .await;

    let busy = client
        .index_note("busy", "user-1", &json!({}))
        .await
        .expect_err("503");
    assert!(busy.is_transient());
    assert_eq!(busy.status(), Some(503));

    let bad = client
        .index_note("bad", "user-1", &json!({}))
        .await
        .expect_err("400");
    assert!(!bad.is_transient());

    let metrics = client.metrics();
    assert_eq!(metrics.failed_requests, 2);
    Ok(())
}

#[tokio::test]
async fn cached_search_avoids_the_network() -> Result<()> {
    let mut server = setup_mock_server().await;
    let client = ready_client(&mut server).await?;
    let search = server
        .mock("POST", "/notes/_search")
        .with_status(200)
        .with_body(r#"{"hits":{"total":{"value":1},"hits":[{"_id":"n1"}]}}"#)
        .expect(1)
        .create_async()
        .await;

    let query = json!({ "query": { "match": { "content": "rust" } }, "size": 10 });
    let first = client.search("notes", &query).await?;
    // same query with keys in another order
    let reordered = json!({ "size": 10, "query": { "match": { "content": "rust" } } });
    let second = client.search("notes", &reordered).await?;

    assert_eq!(first, second);
    search.assert_async().await;
    let stats = client.cache_stats();
    assert_eq!((stats.hits, stats.misses), (1, 1));
    assert_eq!(client.metrics().cache_hits, 1);
    Ok(())
}

#[tokio::test]
async fn expired_cache_entry_is_refetched() -> Result<()> {
    let mut server = setup_mock_server().await;
    create_health_mock(&mut server, "green").await;
    create_index_mock(&mut server).await;
    let config = backend_config(&server)
        .cache_ttl(Duration::from_millis(50))
        .build()?;
    let client = SearchBackendClient::new(config)?;
    client.initialize().await?;

    let search = server
        .mock("POST", "/notes/_search")
        .with_status(200)
        .with_body(r#"{"hits":{"hits":[]}}"#)
        .expect(2)
        .create_async()
        .await;

    let query = json!({ "query": { "match_all": {} } });
    client.search("notes", &query).await?;
    tokio::time::sleep(Duration::from_millis(120)).await;
    client.search("notes", &query).await?;

    search.assert_async().await;
    assert_eq!(client.cache_stats().expirations, 1);
    Ok(())
}

#[tokio::test]
async fn slow_operations_are_logged_newest_first() -> Result<()> {
    let mut server = setup_mock_server().await;
    create_health_mock(&mut server, "green").await;
    create_index_mock(&mut server).await;
    let config = backend_config(&server)
        .slow_operation_threshold(Duration::ZERO)
        .build()?;
    let client = SearchBackendClient::new(config)?;
    client.initialize().await?;

    let slow = client.slow_operations(10);
    assert_eq!(slow.len(), 2);
    assert_eq!(slow[0].operation, "create_index");
    assert_eq!(slow[1].operation, "cluster_health");
    assert_eq!(client.metrics().slow_operations, 2);
    assert_eq!(client.slow_operations(1).len(), 1);
    Ok(())
}

#[tokio::test]
async fn bulk_queue_flushes_as_ndjson() -> Result<()> {
    let mut server = setup_mock_server().await;
    let client = ready_client(&mut server).await?;
    let bulk = server
        .mock("POST", "/_bulk")
        .match_header("content-type", "application/x-ndjson")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex(r#""_id":"n1""#.to_string()),
            Matcher::Regex(r#""delete""#.to_string()),
            Matcher::Regex(r#""routing":"user-1""#.to_string()),
        ]))
        .with_status(200)
        .with_body(
            json!({
                "took": 3,
                "errors": false,
                "items": [
                    { "index": { "_id": "n1", "status": 201 } },
                    { "delete": { "_id": "n2", "status": 200 } }
                ]
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    client.queue_bulk_operation(
        BulkOperation::index("notes", "n1", json!({ "id": "n1" })).with_routing("user-1"),
    )?;
    client.queue_bulk_operation(BulkOperation::delete("notes", "n2"))?;
    assert_eq!(client.pending_bulk_operations(), 2);

    assert_eq!(client.flush_bulk_queue().await?, 2);
    assert_eq!(client.pending_bulk_operations(), 0);
    bulk.assert_async().await;

    let metrics = client.metrics();
    assert_eq!(metrics.bulk_flushes, 1);
    assert_eq!(metrics.bulk_operations, 2);
    assert_eq!(metrics.bulk_failures, 0);
    Ok(())
}

#[tokio::test]
async fn rejected_bulk_items_are_counted() -> Result<()> {
    let mut server = setup_mock_server().await;
    let client = ready_client(&mut server).await?;
    server
        .mock("POST", "/_bulk")
        .with_status(200)
        .with_body(
            json!({
                "took": 1,
                "errors": true,
                "items": [
                    { "index": { "_id": "n1", "status": 201 } },
                    { "index": { "_id": "n2", "status": 400, "error": { "type": "mapper_parsing_exception" } } }
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let summary = client
        .bulk_execute(&[
            BulkOperation::index("notes", "n1", json!({})),
            BulkOperation::index("notes", "n2", json!({})),
        ])
        .await?;
    assert_eq!(summary.total, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(client.metrics().bulk_failures, 1);
    Ok(())
}

#[tokio::test]
async fn receipts_carry_each_item_outcome() -> Result<()> {
    let mut server = setup_mock_server().await;
    let client = ready_client(&mut server).await?;
    server
        .mock("POST", "/_bulk")
        .with_status(200)
        .with_body(
            json!({
                "took": 1,
                "errors": true,
                "items": [
                    { "index": { "_id": "n1", "status": 201 } },
                    { "index": { "_id": "n2", "status": 429, "error": { "type": "es_rejected_execution_exception", "reason": "queue full" } } },
                    { "delete": { "_id": "n3", "status": 200 } }
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let first = client.submit_bulk_operation(BulkOperation::index("notes", "n1", json!({})))?;
    let second = client.submit_bulk_operation(BulkOperation::index("notes", "n2", json!({})))?;
    let third = client.submit_bulk_operation(BulkOperation::delete("notes", "n3"))?;
    assert_eq!(client.flush_bulk_queue().await?, 3);

    assert!(first.wait().await.is_ok());
    let err = second.wait().await.expect_err("rejected item");
    assert!(matches!(
        err,
        BackendError::BulkItemRejected { ref id, status: 429, ref reason } if id == "n2" && reason == "queue full"
    ));
    assert!(err.is_transient());
    assert!(third.wait().await.is_ok());
    Ok(())
}

#[tokio::test]
async fn failed_bulk_request_fails_every_receipt() -> Result<()> {
    let mut server = setup_mock_server().await;
    let client = ready_client(&mut server).await?;
    let bulk = server
        .mock("POST", "/_bulk")
        .with_status(503)
        .with_body("unavailable")
        .expect(1)
        .create_async()
        .await;

    let first = client.submit_bulk_operation(BulkOperation::index("notes", "n1", json!({})))?;
    let second = client.submit_bulk_operation(BulkOperation::delete("notes", "n2"))?;
    let err = client.flush_bulk_queue().await.expect_err("503");
    assert_eq!(err.status(), Some(503));
    assert_eq!(client.pending_bulk_operations(), 0);
    bulk.assert_async().await;

    for receipt in [first, second] {
        let err = receipt.wait().await.expect_err("request failed");
        assert_eq!(err.status(), Some(503));
        assert!(err.is_transient());
    }
    assert_eq!(client.metrics().bulk_failures, 2);
    Ok(())
}
