//! Core configuration types
//!
//! `IndexerConfig` holds the scheduling, retry, admission and filtering knobs.
//! `BackendConfig` holds connection, bulk, cache and slow-log settings for the
//! search backend client. Durations are serialized as whole milliseconds.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::errors::ConfigError;

const MIB: u64 = 1024 * 1024;

pub const DEFAULT_BATCH_SIZE: usize = 1000;
pub const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_millis(5000);
pub const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 100_000;
pub const DEFAULT_MEMORY_WARNING_THRESHOLD: u64 = 500 * MIB;
pub const DEFAULT_MEMORY_LIMIT_THRESHOLD: u64 = 1000 * MIB;
pub const DEFAULT_MIN_QUALITY_SCORE: f32 = 0.2;
pub const DEFAULT_SPAM_THRESHOLD: f32 = 0.4;
pub const DEFAULT_FAILED_LOG_CAPACITY: usize = 1000;

pub const DEFAULT_BACKEND_HOST: &str = "http://localhost:9200";
pub const DEFAULT_NOTES_INDEX: &str = "notes";
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_BULK_BATCH_SIZE: usize = 1000;
pub const DEFAULT_BULK_FLUSH_INTERVAL: Duration = Duration::from_millis(5000);
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;
pub const DEFAULT_SLOW_OPERATION_THRESHOLD: Duration = Duration::from_millis(1000);
pub const DEFAULT_SLOW_LOG_CAPACITY: usize = 100;

/// Serde helpers carrying a `Duration` as integer milliseconds
pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Scheduling, retry, admission and filtering settings for `NoteIndexer`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    pub(crate) batch_size: usize,
    #[serde(with = "duration_ms")]
    pub(crate) batch_timeout: Duration,
    /// Number of worker tasks; `None` selects half the available cores
    #[serde(alias = "max_concurrent_batches")]
    pub(crate) worker_count: Option<usize>,
    pub(crate) max_retry_attempts: u32,
    #[serde(with = "duration_ms")]
    pub(crate) retry_delay: Duration,
    pub(crate) max_queue_size: usize,
    pub(crate) memory_warning_threshold: u64,
    pub(crate) memory_limit_threshold: u64,
    /// When disabled, writes go through the backend's bulk queue
    pub(crate) enable_real_time_indexing: bool,
    pub(crate) failed_log_capacity: usize,

    pub(crate) index_nsfw_content: bool,
    pub(crate) index_spam_content: bool,
    pub(crate) spam_threshold: f32,
    pub(crate) min_quality_score: f32,
    pub(crate) blocked_users: Vec<String>,
    pub(crate) blocked_hashtags: Vec<String>,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            batch_timeout: DEFAULT_BATCH_TIMEOUT,
            worker_count: None,
            max_retry_attempts: DEFAULT_MAX_RETRY_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            memory_warning_threshold: DEFAULT_MEMORY_WARNING_THRESHOLD,
            memory_limit_threshold: DEFAULT_MEMORY_LIMIT_THRESHOLD,
            enable_real_time_indexing: true,
            failed_log_capacity: DEFAULT_FAILED_LOG_CAPACITY,
            index_nsfw_content: true,
            index_spam_content: false,
            spam_threshold: DEFAULT_SPAM_THRESHOLD,
            min_quality_score: DEFAULT_MIN_QUALITY_SCORE,
            blocked_users: Vec::new(),
            blocked_hashtags: Vec::new(),
        }
    }
}

impl IndexerConfig {
    /// High-throughput settings: large batches, many workers, generous memory
    #[must_use]
    pub fn production() -> Self {
        Self {
            batch_size: 5000,
            batch_timeout: Duration::from_millis(2000),
            worker_count: Some(10),
            max_retry_attempts: 5,
            max_queue_size: 1_000_000,
            memory_warning_threshold: 2000 * MIB,
            memory_limit_threshold: 4000 * MIB,
            ..Self::default()
        }
    }

    /// Small batches and short timeouts for local work
    #[must_use]
    pub fn development() -> Self {
        Self {
            batch_size: 100,
            batch_timeout: Duration::from_millis(1000),
            worker_count: Some(2),
            max_queue_size: 10_000,
            memory_warning_threshold: 100 * MIB,
            memory_limit_threshold: 200 * MIB,
            ..Self::default()
        }
    }

    /// Tiny, fast-cycling settings for tests
    #[must_use]
    pub fn testing() -> Self {
        Self {
            batch_size: 10,
            batch_timeout: Duration::from_millis(20),
            worker_count: Some(1),
            max_retry_attempts: 3,
            retry_delay: Duration::from_millis(5),
            max_queue_size: 1000,
            memory_warning_threshold: 10 * MIB,
            memory_limit_threshold: 20 * MIB,
            ..Self::default()
        }
    }

    /// Check every field for an acceptable value
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::invalid("batch_size", "must be greater than 0"));
        }
        if self.batch_timeout.is_zero() {
            return Err(ConfigError::invalid("batch_timeout", "must be greater than 0"));
        }
        if self.worker_count == Some(0) {
            return Err(ConfigError::invalid("worker_count", "must be greater than 0"));
        }
        if self.max_queue_size == 0 {
            return Err(ConfigError::invalid("max_queue_size", "must be greater than 0"));
        }
        if self.memory_limit_threshold == 0 {
            return Err(ConfigError::invalid(
                "memory_limit_threshold",
                "must be greater than 0",
            ));
        }
        if self.memory_warning_threshold > self.memory_limit_threshold {
            return Err(ConfigError::invalid(
                "memory_warning_threshold",
                format!(
                    "{} exceeds memory_limit_threshold {}",
                    self.memory_warning_threshold, self.memory_limit_threshold
                ),
            ));
        }
        if self.failed_log_capacity == 0 {
            return Err(ConfigError::invalid(
                "failed_log_capacity",
                "must be greater than 0",
            ));
        }
        if !(0.0..=1.0).contains(&self.min_quality_score) {
            return Err(ConfigError::invalid(
                "min_quality_score",
                format!("{} is outside [0, 1]", self.min_quality_score),
            ));
        }
        if !(self.spam_threshold > 0.0 && self.spam_threshold <= 1.0) {
            return Err(ConfigError::invalid(
                "spam_threshold",
                format!("{} is outside (0, 1]", self.spam_threshold),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    #[must_use]
    pub fn batch_timeout(&self) -> Duration {
        self.batch_timeout
    }

    /// Configured worker count, or `max(1, cores / 2)` when unset
    #[must_use]
    pub fn effective_worker_count(&self) -> usize {
        self.worker_count
            .unwrap_or_else(|| (num_cpus::get() / 2).max(1))
    }

    #[must_use]
    pub fn max_retry_attempts(&self) -> u32 {
        self.max_retry_attempts
    }

    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    #[must_use]
    pub fn max_queue_size(&self) -> usize {
        self.max_queue_size
    }

    #[must_use]
    pub fn memory_warning_threshold(&self) -> u64 {
        self.memory_warning_threshold
    }

    #[must_use]
    pub fn memory_limit_threshold(&self) -> u64 {
        self.memory_limit_threshold
    }

    #[must_use]
    pub fn real_time_indexing(&self) -> bool {
        self.enable_real_time_indexing
    }

    #[must_use]
    pub fn failed_log_capacity(&self) -> usize {
        self.failed_log_capacity
    }

    #[must_use]
    pub fn index_nsfw_content(&self) -> bool {
        self.index_nsfw_content
    }

    #[must_use]
    pub fn index_spam_content(&self) -> bool {
        self.index_spam_content
    }

    #[must_use]
    pub fn spam_threshold(&self) -> f32 {
        self.spam_threshold
    }

    #[must_use]
    pub fn min_quality_score(&self) -> f32 {
        self.min_quality_score
    }

    #[must_use]
    pub fn blocked_users(&self) -> &[String] {
        &self.blocked_users
    }

    #[must_use]
    pub fn blocked_hashtags(&self) -> &[String] {
        &self.blocked_hashtags
    }
}

/// Connection, bulk, cache and slow-log settings for `SearchBackendClient`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub(crate) hosts: Vec<String>,
    pub(crate) username: Option<String>,
    #[serde(skip_serializing)]
    pub(crate) password: Option<String>,
    #[serde(skip_serializing)]
    pub(crate) api_key: Option<String>,
    #[serde(with = "duration_ms")]
    pub(crate) connection_timeout: Duration,
    #[serde(with = "duration_ms")]
    pub(crate) request_timeout: Duration,
    pub(crate) notes_index: String,
    pub(crate) create_index_on_startup: bool,
    pub(crate) number_of_shards: u32,
    pub(crate) number_of_replicas: u32,

    pub(crate) bulk_batch_size: usize,
    #[serde(with = "duration_ms")]
    pub(crate) bulk_flush_interval: Duration,

    pub(crate) enable_request_cache: bool,
    #[serde(with = "duration_ms")]
    pub(crate) cache_ttl: Duration,
    pub(crate) cache_capacity: usize,

    #[serde(with = "duration_ms")]
    pub(crate) slow_operation_threshold: Duration,
    pub(crate) slow_log_capacity: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            hosts: vec![DEFAULT_BACKEND_HOST.to_string()],
            username: None,
            password: None,
            api_key: None,
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            notes_index: DEFAULT_NOTES_INDEX.to_string(),
            create_index_on_startup: true,
            number_of_shards: 3,
            number_of_replicas: 1,
            bulk_batch_size: DEFAULT_BULK_BATCH_SIZE,
            bulk_flush_interval: DEFAULT_BULK_FLUSH_INTERVAL,
            enable_request_cache: true,
            cache_ttl: DEFAULT_CACHE_TTL,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            slow_operation_threshold: DEFAULT_SLOW_OPERATION_THRESHOLD,
            slow_log_capacity: DEFAULT_SLOW_LOG_CAPACITY,
        }
    }
}

impl BackendConfig {
    /// Larger bulk batches, replicated shards, longer cache lifetime
    #[must_use]
    pub fn production() -> Self {
        Self {
            number_of_shards: 5,
            number_of_replicas: 2,
            bulk_batch_size: 5000,
            bulk_flush_interval: Duration::from_millis(2000),
            cache_ttl: Duration::from_secs(10 * 60),
            slow_operation_threshold: Duration::from_millis(500),
            ..Self::default()
        }
    }

    /// Single shard, no replicas, small bulk batches
    #[must_use]
    pub fn development() -> Self {
        Self {
            number_of_shards: 1,
            number_of_replicas: 0,
            bulk_batch_size: 100,
            bulk_flush_interval: Duration::from_millis(1000),
            cache_ttl: Duration::from_secs(60),
            ..Self::default()
        }
    }

    /// Short timeouts and intervals so tests do not stall
    #[must_use]
    pub fn testing() -> Self {
        Self {
            connection_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(5),
            number_of_shards: 1,
            number_of_replicas: 0,
            bulk_batch_size: 10,
            bulk_flush_interval: Duration::from_millis(50),
            cache_ttl: Duration::from_secs(1),
            cache_capacity: 100,
            slow_log_capacity: 10,
            ..Self::default()
        }
    }

    /// Check every field for an acceptable value
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hosts.is_empty() {
            return Err(ConfigError::NoHosts);
        }
        for host in &self.hosts {
            let parsed = url::Url::parse(host).map_err(|e| ConfigError::InvalidHost {
                host: host.clone(),
                reason: e.to_string(),
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ConfigError::InvalidHost {
                    host: host.clone(),
                    reason: format!("unsupported scheme '{}'", parsed.scheme()),
                });
            }
        }
        if self.notes_index.trim().is_empty() {
            return Err(ConfigError::invalid("notes_index", "must not be empty"));
        }
        if self.connection_timeout.is_zero() {
            return Err(ConfigError::invalid(
                "connection_timeout",
                "must be greater than 0",
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::invalid("request_timeout", "must be greater than 0"));
        }
        if self.bulk_batch_size == 0 {
            return Err(ConfigError::invalid("bulk_batch_size", "must be greater than 0"));
        }
        if self.bulk_flush_interval.is_zero() {
            return Err(ConfigError::invalid(
                "bulk_flush_interval",
                "must be greater than 0",
            ));
        }
        if self.cache_capacity == 0 {
            return Err(ConfigError::invalid("cache_capacity", "must be greater than 0"));
        }
        if self.slow_log_capacity == 0 {
            return Err(ConfigError::invalid(
                "slow_log_capacity",
                "must be greater than 0",
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    #[must_use]
    pub fn connection_timeout(&self) -> Duration {
        self.connection_timeout
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    #[must_use]
    pub fn notes_index(&self) -> &str {
        &self.notes_index
    }

    #[must_use]
    pub fn create_index_on_startup(&self) -> bool {
        self.create_index_on_startup
    }

    #[must_use]
    pub fn bulk_batch_size(&self) -> usize {
        self.bulk_batch_size
    }

    #[must_use]
    pub fn bulk_flush_interval(&self) -> Duration {
        self.bulk_flush_interval
    }

    #[must_use]
    pub fn request_cache_enabled(&self) -> bool {
        self.enable_request_cache
    }

    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    #[must_use]
    pub fn cache_capacity(&self) -> usize {
        self.cache_capacity
    }

    #[must_use]
    pub fn slow_operation_threshold(&self) -> Duration {
        self.slow_operation_threshold
    }

    #[must_use]
    pub fn slow_log_capacity(&self) -> usize {
        self.slow_log_capacity
    }
}
