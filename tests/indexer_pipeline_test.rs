mod common;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use mockito::Matcher;
use note_indexer::{IndexerConfig, NoteDocument, NoteIndexer, SearchBackendClient};
use serde_json::json;

use common::{
    backend_config, create_health_mock, create_index_mock, note, ready_client, setup_mock_server,
    wait_for_condition,
};

const WAIT: Duration = Duration::from_secs(3);

#[tokio::test]
async fn notes_flow_from_submission_to_backend() -> Result<()> {
    let mut server = setup_mock_server().await;
    let client = Arc::new(ready_client(&mut server).await?);
    let put = server
        .mock("PUT", Matcher::Regex(r"^/notes/_doc/n[12]".to_string()))
        .match_query(Matcher::UrlEncoded("routing".into(), "user-1".into()))
        .match_body(Matcher::PartialJson(json!({
            "user_id": "user-1",
            "language": "en",
            "indexing_metadata": { "source": "realtime" }
        })))
        .with_status(201)
        .with_body(r#"{"result":"created"}"#)
        .expect(2)
        .create_async()
        .await;

    let indexer = NoteIndexer::new(Arc::clone(&client), IndexerConfig::testing())?;
    indexer.start();
    assert!(indexer.submit(note("n1"), None));
    assert!(indexer.submit(note("n2"), Some(50)));

    // four links in one note scores exactly at the spam threshold
    let spam = NoteDocument::new(
        "spam",
        "user-1",
        "Check this out! http://bit.ly/x http://bit.ly/y http://bit.ly/z http://bit.ly/w",
        Utc::now(),
    );
    assert!(!indexer.submit(spam, None));

    assert!(wait_for_condition(|| indexer.metrics().notes_indexed == 2, WAIT).await);
    put.assert_async().await;

    let metrics = indexer.metrics();
    assert_eq!(metrics.notes_skipped, 1);
    assert_eq!(metrics.notes_failed, 0);
    assert!(indexer.health_check());

    indexer.stop().await;
    client.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn unavailable_backend_dead_letters_after_retries() -> Result<()> {
    let mut server = setup_mock_server().await;
    let client = Arc::new(ready_client(&mut server).await?);
    let put = server
        .mock("PUT", Matcher::Regex(r"^/notes/_doc/n1".to_string()))
        .with_status(503)
        .with_body("unavailable")
        .expect(4)
        .create_async()
        .await;

    let indexer = NoteIndexer::new(Arc::clone(&client), IndexerConfig::testing())?;
    indexer.start();
    indexer.submit(note("n1"), None);

    assert!(wait_for_condition(|| !indexer.failed_operations(10).is_empty(), WAIT).await);
    tokio::time::sleep(Duration::from_millis(100)).await;

    put.assert_async().await;
    let failed = indexer.failed_operations(10);
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].note_id, "n1");
    assert_eq!(failed[0].retry_count, 3);
    assert!(failed[0].error.contains("503"));
    assert_eq!(indexer.queue_size(), 0);

    indexer.stop().await;
    client.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn bulk_mode_batches_through_the_flush_buffer() -> Result<()> {
    let mut server = setup_mock_server().await;
    let client = Arc::new(ready_client(&mut server).await?);
    let bulk = server
        .mock("POST", "/_bulk")
        .match_header("content-type", "application/x-ndjson")
        .with_status(200)
        .with_body(r#"{"took":2,"errors":false,"items":[]}"#)
        .expect(1)
        .create_async()
        .await;

    let config = IndexerConfig::builder()
        .real_time_indexing(false)
        .worker_count(1)
        .batch_timeout(Duration::from_millis(20))
        .build()?;
    let indexer = NoteIndexer::new(Arc::clone(&client), config)?;
    indexer.start();
    indexer.pause();
    let accepted = indexer.index_batch(vec![note("b1"), note("b2"), note("b3")]);
    assert_eq!(accepted, 3);
    indexer.resume();

    assert!(wait_for_condition(|| client.pending_bulk_operations() == 3, WAIT).await);
    // buffered is not indexed until the request succeeds
    assert_eq!(indexer.metrics().notes_indexed, 0);
    assert_eq!(client.flush_bulk_queue().await?, 3);
    assert!(wait_for_condition(|| indexer.metrics().notes_indexed == 3, WAIT).await);

    indexer.stop().await;
    client.shutdown().await;
    bulk.assert_async().await;
    assert_eq!(client.metrics().bulk_operations, 3);
    Ok(())
}

#[tokio::test]
async fn unavailable_bulk_endpoint_retries_then_dead_letters() -> Result<()> {
    let mut server = setup_mock_server().await;
    create_health_mock(&mut server, "green").await;
    create_index_mock(&mut server).await;
    let bulk = server
        .mock("POST", "/_bulk")
        .with_status(503)
        .with_body("unavailable")
        .expect(4)
        .create_async()
        .await;
    let client = Arc::new(SearchBackendClient::new(
        backend_config(&server)
            .bulk_flush_interval(Duration::from_millis(20))
            .build()?,
    )?);
    client.initialize().await?;

    let config = IndexerConfig::builder()
        .real_time_indexing(false)
        .worker_count(1)
        .batch_timeout(Duration::from_millis(20))
        .max_retry_attempts(3)
        .retry_delay(Duration::from_millis(5))
        .build()?;
    let indexer = NoteIndexer::new(Arc::clone(&client), config)?;
    indexer.start();
    assert!(indexer.submit(note("n1"), None));

    assert!(wait_for_condition(|| indexer.failed_operations(10).len() == 1, WAIT).await);
    let failed = indexer.failed_operations(10);
    assert_eq!(failed[0].note_id, "n1");
    assert_eq!(failed[0].retry_count, 3);
    assert!(failed[0].error.contains("503"));

    let metrics = indexer.metrics();
    assert_eq!(metrics.notes_indexed, 0);
    assert_eq!(metrics.retries_attempted, 3);
    indexer.stop().await;
    client.shutdown().await;
    bulk.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn flush_drains_a_paused_queue() -> Result<()> {
    let mut server = setup_mock_server().await;
    let client = Arc::new(ready_client(&mut server).await?);
    let delete = server
        .mock("DELETE", Matcher::Regex(r"^/notes/_doc/old".to_string()))
        .with_status(200)
        .with_body(r#"{"result":"deleted"}"#)
        .expect(1)
        .create_async()
        .await;
    let update = server
        .mock("POST", Matcher::Regex(r"^/notes/_update/n1".to_string()))
        .with_status(200)
        .with_body(r#"{"result":"updated"}"#)
        .expect(1)
        .create_async()
        .await;

    let indexer = NoteIndexer::new(Arc::clone(&client), IndexerConfig::testing())?;
    indexer.start();
    indexer.pause();

    let mut liked = note("n1");
    liked.metrics.likes_count = 40;
    assert!(indexer.update_note_metrics(liked));
    assert!(indexer.delete_authored_note("old", "user-1"));
    assert_eq!(indexer.queue_size(), 2);
    assert!(indexer.status().paused);

    assert_eq!(indexer.flush_queue().await, 2);
    delete.assert_async().await;
    update.assert_async().await;

    let metrics = indexer.metrics();
    assert_eq!(metrics.notes_deleted, 1);
    assert_eq!(metrics.notes_updated, 1);
    assert_eq!(indexer.stop().await, 0);
    client.shutdown().await;
    Ok(())
}
