use std::collections::HashMap;
use std::time::Duration;

use super::*;

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |var| map.get(var).cloned()
}

#[test]
fn indexer_defaults_validate() {
    let config = IndexerConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.batch_size(), 1000);
    assert_eq!(config.batch_timeout(), Duration::from_millis(5000));
    assert_eq!(config.max_retry_attempts(), 3);
    assert_eq!(config.max_queue_size(), 100_000);
    assert!(config.effective_worker_count() >= 1);
    assert!(!config.index_spam_content());
}

#[test]
fn presets_are_valid() {
    for config in [
        IndexerConfig::production(),
        IndexerConfig::development(),
        IndexerConfig::testing(),
    ] {
        assert!(config.validate().is_ok(), "{config:?}");
    }
    for config in [
        BackendConfig::production(),
        BackendConfig::development(),
        BackendConfig::testing(),
    ] {
        assert!(config.validate().is_ok(), "{config:?}");
    }
}

#[test]
fn indexer_builder_rejects_bad_values() {
    let err = IndexerConfig::builder().batch_size(0).build().unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { field: "batch_size", .. }));

    let err = IndexerConfig::builder()
        .memory_thresholds_mb(200, 100)
        .build()
        .unwrap_err();
    assert!(matches!(
        err,
        ConfigError::InvalidValue {
            field: "memory_warning_threshold",
            ..
        }
    ));

    let err = IndexerConfig::builder()
        .min_quality_score(1.5)
        .build()
        .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { field: "min_quality_score", .. }));
}

#[test]
fn block_hashtag_normalizes() {
    let config = IndexerConfig::builder()
        .block_hashtag("#Crypto")
        .build()
        .unwrap();
    assert_eq!(config.blocked_hashtags(), ["crypto".to_string()]);
}

#[test]
fn backend_builder_requires_valid_host() {
    let config = BackendConfig::builder()
        .host("http://search.internal:9200")
        .notes_index("notes_v2")
        .build()
        .unwrap();
    assert_eq!(config.hosts(), ["http://search.internal:9200".to_string()]);
    assert_eq!(config.notes_index(), "notes_v2");

    let err = BackendConfig::builder().host("not a url").build().unwrap_err();
    assert!(matches!(err, ConfigError::InvalidHost { .. }));

    let err = BackendConfig::builder()
        .host("ftp://search.internal")
        .build()
        .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidHost { .. }));
}

#[test]
fn backend_rejects_empty_index_and_zero_bulk() {
    let err = BackendConfig::builder()
        .host("http://localhost:9200")
        .notes_index("  ")
        .build()
        .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { field: "notes_index", .. }));

    let err = BackendConfig::builder()
        .host("http://localhost:9200")
        .bulk_batch_size(0)
        .build()
        .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { field: "bulk_batch_size", .. }));
}

#[test]
fn indexer_from_lookup_overrides_preset() {
    let config = IndexerConfig::from_lookup(env(&[
        ("NOTE_INDEXER_PROFILE", "development"),
        ("NOTE_INDEXER_BATCH_SIZE", "42"),
        ("NOTE_INDEXER_RETRY_DELAY_MS", "250"),
        ("NOTE_INDEXER_REAL_TIME", "false"),
        ("NOTE_INDEXER_BLOCKED_HASHTAGS", "#Spam, ads ,"),
    ]))
    .unwrap();

    assert_eq!(config.batch_size(), 42);
    assert_eq!(config.retry_delay(), Duration::from_millis(250));
    assert!(!config.real_time_indexing());
    assert_eq!(config.max_queue_size(), 10_000);
    assert_eq!(
        config.blocked_hashtags(),
        ["spam".to_string(), "ads".to_string()]
    );
}

#[test]
fn indexer_from_lookup_reports_bad_number() {
    let err = IndexerConfig::from_lookup(env(&[("NOTE_INDEXER_BATCH_SIZE", "lots")])).unwrap_err();
    assert!(matches!(err, ConfigError::Env { ref var, .. } if var == "NOTE_INDEXER_BATCH_SIZE"));
}

#[test]
fn backend_from_lookup_reads_hosts_and_auth() {
    let config = BackendConfig::from_lookup(env(&[
        ("SEARCH_BACKEND_HOSTS", "http://a:9200,http://b:9200"),
        ("SEARCH_BACKEND_USERNAME", "indexer"),
        ("SEARCH_BACKEND_PASSWORD", "secret"),
        ("SEARCH_BACKEND_CACHE_TTL_MS", "1500"),
    ]))
    .unwrap();

    assert_eq!(config.hosts().len(), 2);
    assert_eq!(config.username(), Some("indexer"));
    assert_eq!(config.cache_ttl(), Duration::from_millis(1500));
}

#[test]
fn durations_serialize_as_millis() {
    let config = IndexerConfig::testing();
    let json = serde_json::to_value(&config).unwrap();
    assert_eq!(json["batch_timeout"], 20);
    assert_eq!(json["retry_delay"], 5);

    let back: IndexerConfig = serde_json::from_value(json).unwrap();
    assert_eq!(back, config);
}

#[test]
fn backend_secrets_are_not_serialized() {
    let config = BackendConfig::builder()
        .host("http://localhost:9200")
        .basic_auth("user", "hunter2")
        .api_key("key")
        .build()
        .unwrap();
    let json = serde_json::to_string(&config).unwrap();
    assert!(!json.contains("hunter2"));
    assert!(!json.contains("\"api_key\""));
}
