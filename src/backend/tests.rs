use std::time::{Duration, Instant};

use serde_json::json;

use super::*;

#[test]
fn bulk_body_is_ndjson() {
    let ops = vec![
        BulkOperation::index("notes", "n1", json!({"content": "hi"})).with_routing("u1"),
        BulkOperation::update("notes", "n2", json!({"metrics": {"likes_count": 3}})),
        BulkOperation::delete("notes", "n3"),
    ];
    let body = encode_bulk_body(&ops);
    let lines: Vec<&str> = body.lines().collect();

    assert!(body.ends_with('\n'));
    assert_eq!(lines.len(), 5);
    let action: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(action, json!({"index": {"_index": "notes", "_id": "n1", "routing": "u1"}}));
    assert_eq!(serde_json::from_str::<serde_json::Value>(lines[1]).unwrap(), json!({"content": "hi"}));
    assert_eq!(
        serde_json::from_str::<serde_json::Value>(lines[3]).unwrap(),
        json!({"doc": {"metrics": {"likes_count": 3}}})
    );
    assert_eq!(
        serde_json::from_str::<serde_json::Value>(lines[4]).unwrap(),
        json!({"delete": {"_index": "notes", "_id": "n3"}})
    );
}

#[test]
fn empty_routing_is_omitted() {
    let op = BulkOperation::delete("notes", "n1").with_routing("");
    assert_eq!(op.routing, None);
}

#[test]
fn bulk_response_counts_failed_items() {
    let response: BulkResponse = serde_json::from_value(json!({
        "took": 7,
        "errors": true,
        "items": [
            {"index": {"_id": "a", "status": 201}},
            {"index": {"_id": "b", "status": 400, "error": {"type": "mapper_parsing_exception"}}},
            {"delete": {"_id": "c", "status": 404, "result": "not_found"}}
        ]
    }))
    .unwrap();
    assert_eq!(response.failed_items(), 1);
    assert_eq!(
        response.item_failures(),
        vec![BulkItemFailure {
            position: 1,
            id: "b".into(),
            status: 400,
            reason: "mapper_parsing_exception".into(),
        }]
    );

    let clean: BulkResponse = serde_json::from_value(json!({"errors": false, "items": []})).unwrap();
    assert_eq!(clean.failed_items(), 0);
}

#[test]
fn fingerprint_ignores_key_order() {
    let a = json!({"query": {"match": {"content": "rust"}}, "size": 10});
    let b: serde_json::Value =
        serde_json::from_str(r#"{ "size": 10, "query": { "match": { "content": "rust" } } }"#).unwrap();
    assert_eq!(fingerprint("notes", &a), fingerprint("notes", &b));
    assert_ne!(fingerprint("notes", &a), fingerprint("other", &a));
    assert_ne!(
        fingerprint("notes", &a),
        fingerprint("notes", &json!({"query": {"match": {"content": "go"}}, "size": 10}))
    );
}

#[test]
fn cache_expires_lazily() {
    let cache = QueryCache::new(10, Duration::from_secs(60));
    let start = Instant::now();
    cache.insert(1, json!({"hits": 1}), start);

    assert_eq!(cache.get(1, start + Duration::from_secs(30)), Some(json!({"hits": 1})));
    assert_eq!(cache.len(), 1);

    assert_eq!(cache.get(1, start + Duration::from_secs(61)), None);
    assert_eq!(cache.len(), 0);

    let stats = cache.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.expirations, 1);
}

#[test]
fn cache_is_bounded_by_capacity() {
    let cache = QueryCache::new(2, Duration::from_secs(60));
    let now = Instant::now();
    for key in 0..5 {
        cache.insert(key, json!(key), now);
    }
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.get(4, now), Some(json!(4)));
    assert_eq!(cache.get(0, now), None);
}

#[test]
fn slow_log_keeps_most_recent() {
    let log = SlowOperationLog::new(3);
    for i in 0..5 {
        log.record("index_note", &format!("/notes/_doc/{i}"), Duration::from_millis(1500));
    }
    assert_eq!(log.len(), 3);
    let recent = log.recent(2);
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].target, "/notes/_doc/4");
    assert_eq!(recent[1].target, "/notes/_doc/3");
    assert_eq!(recent[0].duration_ms, 1500);
}

#[test]
fn metrics_snapshot_rates() {
    let metrics = BackendMetrics::new();
    metrics.record_request(true, Duration::from_millis(10));
    metrics.record_request(true, Duration::from_millis(20));
    metrics.record_request(false, Duration::from_millis(30));
    metrics.record_cache_hit();
    metrics.record_cache_miss();
    metrics.record_bulk_flush(10, 2);

    let snap = metrics.snapshot();
    assert_eq!(snap.total_requests, 3);
    assert_eq!(snap.failed_requests, 1);
    assert!((snap.success_rate - 2.0 / 3.0).abs() < 1e-9);
    assert!((snap.average_latency_ms - 20.0).abs() < 1e-9);
    assert!((snap.cache_hit_rate - 0.5).abs() < 1e-9);
    assert_eq!(snap.bulk_operations, 10);
    assert_eq!(snap.bulk_failures, 2);

    metrics.reset();
    assert_eq!(metrics.snapshot(), BackendMetricsSnapshot::default());
}

#[test]
fn transient_classification() {
    let status = |status| BackendError::Status {
        operation: "index_note".into(),
        status,
        body: String::new(),
    };
    assert!(status(500).is_transient());
    assert!(status(503).is_transient());
    assert!(status(429).is_transient());
    assert!(status(408).is_transient());
    assert!(!status(400).is_transient());
    assert!(!status(404).is_transient());
    assert!(BackendError::NotReady.is_transient());
    assert!(!BackendError::Other("bad".into()).is_transient());
    assert_eq!(status(409).status(), Some(409));

    let rejected = |status| BackendError::BulkItemRejected {
        id: "n1".into(),
        status,
        reason: "x".into(),
    };
    assert!(rejected(429).is_transient());
    assert!(!rejected(400).is_transient());
    assert_eq!(rejected(400).status(), Some(400));
    assert!(BackendError::BulkRequestFailed("reset".into()).is_transient());
}

#[test]
fn shared_failure_keeps_status_and_transience() {
    let err = BackendError::Status {
        operation: "bulk /_bulk".into(),
        status: 503,
        body: "busy".into(),
    };
    let copy = err.for_operation();
    assert_eq!(copy.status(), Some(503));
    assert!(copy.is_transient());
    assert_eq!(copy.to_string(), err.to_string());

    let decode = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let copy = BackendError::from(decode).for_operation();
    assert!(!copy.is_transient());
}

#[tokio::test]
async fn receipts_report_their_outcome() {
    assert!(BulkReceipt::ready(Ok(())).wait().await.is_ok());

    let (ack, receipt) = BulkReceipt::channel();
    ack.send(Err(BackendError::NotReady)).unwrap();
    assert!(matches!(receipt.wait().await, Err(BackendError::NotReady)));

    let (ack, receipt) = BulkReceipt::channel();
    drop(ack);
    let err = receipt.wait().await.unwrap_err();
    assert!(matches!(err, BackendError::BulkRequestFailed(_)));
    assert!(err.is_transient());
}

#[test]
fn cluster_health_parses_unknown_status() {
    let health: ClusterHealth =
        serde_json::from_value(json!({"cluster_name": "c", "status": "green", "number_of_nodes": 3}))
            .unwrap();
    assert_eq!(health.status, HealthStatus::Green);
    assert!(health.status.is_available());

    let odd: ClusterHealth = serde_json::from_value(json!({"status": "purple"})).unwrap();
    assert_eq!(odd.status, HealthStatus::Unknown);
    assert!(!odd.status.is_available());
    assert!(!HealthStatus::Red.is_available());
}

#[test]
fn client_rejects_invalid_config() {
    let config = crate::config::BackendConfig {
        hosts: Vec::new(),
        ..crate::config::BackendConfig::default()
    };
    let err = SearchBackendClient::new(config).unwrap_err();
    assert!(matches!(err, BackendError::Config(crate::config::ConfigError::NoHosts)));
}
