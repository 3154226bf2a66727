//! Loading configuration from environment variables
//!
//! Every variable is optional; unset variables keep the preset value.
//! `NOTE_INDEXER_PROFILE` / `SEARCH_BACKEND_PROFILE` select the preset
//! (`production`, `development`, `testing`, anything else is the default).

use std::str::FromStr;
use std::time::Duration;

use super::errors::ConfigError;
use super::types::{BackendConfig, IndexerConfig};

const MIB: u64 = 1024 * 1024;

fn lookup_parsed<T, F>(lookup: &F, var: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| ConfigError::Env {
            var: var.to_string(),
            reason: format!("'{raw}': {e}"),
        }),
    }
}

fn lookup_bool<F>(lookup: &F, var: &str) -> Result<Option<bool>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "" => Ok(None),
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        other => Err(ConfigError::Env {
            var: var.to_string(),
            reason: format!("'{other}' is not a boolean"),
        }),
    }
}

fn lookup_list<F>(lookup: &F, var: &str) -> Option<Vec<String>>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var).map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    })
}

fn lookup_millis<F>(lookup: &F, var: &str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    Ok(lookup_parsed::<u64, F>(lookup, var)?.map(Duration::from_millis))
}

impl IndexerConfig {
    /// Read `NOTE_INDEXER_*` variables from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as `from_env` with an injectable variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup("NOTE_INDEXER_PROFILE").as_deref() {
            Some("production") => IndexerConfig::production(),
            Some("development") => IndexerConfig::development(),
            Some("testing") => IndexerConfig::testing(),
            _ => IndexerConfig::default(),
        };

        if let Some(v) = lookup_parsed(&lookup, "NOTE_INDEXER_BATCH_SIZE")? {
            config.batch_size = v;
        }
        if let Some(v) = lookup_millis(&lookup, "NOTE_INDEXER_BATCH_TIMEOUT_MS")? {
            config.batch_timeout = v;
        }
        if let Some(v) = lookup_parsed(&lookup, "NOTE_INDEXER_WORKER_COUNT")? {
            config.worker_count = Some(v);
        }
        if let Some(v) = lookup_parsed(&lookup, "NOTE_INDEXER_MAX_RETRY_ATTEMPTS")? {
            config.max_retry_attempts = v;
        }
        if let Some(v) = lookup_millis(&lookup, "NOTE_INDEXER_RETRY_DELAY_MS")? {
            config.retry_delay = v;
        }
        if let Some(v) = lookup_parsed(&lookup, "NOTE_INDEXER_MAX_QUEUE_SIZE")? {
            config.max_queue_size = v;
        }
        if let Some(v) = lookup_parsed::<u64, _>(&lookup, "NOTE_INDEXER_MEMORY_WARNING_MB")? {
            config.memory_warning_threshold = v.saturating_mul(MIB);
        }
        if let Some(v) = lookup_parsed::<u64, _>(&lookup, "NOTE_INDEXER_MEMORY_LIMIT_MB")? {
            config.memory_limit_threshold = v.saturating_mul(MIB);
        }
        if let Some(v) = lookup_bool(&lookup, "NOTE_INDEXER_REAL_TIME")? {
            config.enable_real_time_indexing = v;
        }
        if let Some(v) = lookup_bool(&lookup, "NOTE_INDEXER_INDEX_NSFW")? {
            config.index_nsfw_content = v;
        }
        if let Some(v) = lookup_bool(&lookup, "NOTE_INDEXER_INDEX_SPAM")? {
            config.index_spam_content = v;
        }
        if let Some(v) = lookup_parsed(&lookup, "NOTE_INDEXER_SPAM_THRESHOLD")? {
            config.spam_threshold = v;
        }
        if let Some(v) = lookup_parsed(&lookup, "NOTE_INDEXER_MIN_QUALITY")? {
            config.min_quality_score = v;
        }
        if let Some(users) = lookup_list(&lookup, "NOTE_INDEXER_BLOCKED_USERS") {
            config.blocked_users = users;
        }
        if let Some(tags) = lookup_list(&lookup, "NOTE_INDEXER_BLOCKED_HASHTAGS") {
            config.blocked_hashtags = tags
                .into_iter()
                .map(|tag| tag.trim_start_matches('#').to_lowercase())
                .collect();
        }

        config.validate()?;
        Ok(config)
    }
}

impl BackendConfig {
    /// Read `SEARCH_BACKEND_*` variables from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as `from_env` with an injectable variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup("SEARCH_BACKEND_PROFILE").as_deref() {
            Some("production") => BackendConfig::production(),
            Some("development") => BackendConfig::development(),
            Some("testing") => BackendConfig::testing(),
            _ => BackendConfig::default(),
        };

        if let Some(hosts) = lookup_list(&lookup, "SEARCH_BACKEND_HOSTS") {
            config.hosts = hosts;
        }
        if let Some(username) = lookup("SEARCH_BACKEND_USERNAME") {
            config.username = Some(username);
        }
        if let Some(password) = lookup("SEARCH_BACKEND_PASSWORD") {
            config.password = Some(password);
        }
        if let Some(key) = lookup("SEARCH_BACKEND_API_KEY") {
            config.api_key = Some(key);
        }
        if let Some(index) = lookup("SEARCH_BACKEND_INDEX") {
            config.notes_index = index;
        }
        if let Some(v) = lookup_millis(&lookup, "SEARCH_BACKEND_CONNECTION_TIMEOUT_MS")? {
            config.connection_timeout = v;
        }
        if let Some(v) = lookup_millis(&lookup, "SEARCH_BACKEND_REQUEST_TIMEOUT_MS")? {
            config.request_timeout = v;
        }
        if let Some(v) = lookup_bool(&lookup, "SEARCH_BACKEND_CREATE_INDEX")? {
            config.create_index_on_startup = v;
        }
        if let Some(v) = lookup_parsed(&lookup, "SEARCH_BACKEND_BULK_BATCH_SIZE")? {
            config.bulk_batch_size = v;
        }
        if let Some(v) = lookup_millis(&lookup, "SEARCH_BACKEND_BULK_FLUSH_INTERVAL_MS")? {
            config.bulk_flush_interval = v;
        }
        if let Some(v) = lookup_bool(&lookup, "SEARCH_BACKEND_CACHE_ENABLED")? {
            config.enable_request_cache = v;
        }
        if let Some(v) = lookup_millis(&lookup, "SEARCH_BACKEND_CACHE_TTL_MS")? {
            config.cache_ttl = v;
        }
        if let Some(v) = lookup_parsed(&lookup, "SEARCH_BACKEND_CACHE_CAPACITY")? {
            config.cache_capacity = v;
        }
        if let Some(v) = lookup_millis(&lookup, "SEARCH_BACKEND_SLOW_THRESHOLD_MS")? {
            config.slow_operation_threshold = v;
        }

        config.validate()?;
        Ok(config)
    }
}
