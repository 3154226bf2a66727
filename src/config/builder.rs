//! Fluent builders for `IndexerConfig` and `BackendConfig`
//!
//! `BackendConfigBuilder` uses the typestate pattern: at least one host must be
//! supplied before `build()` becomes available. Both builders validate the
//! finished configuration and fail fast with `ConfigError`.

use std::marker::PhantomData;
use std::time::Duration;

use super::errors::ConfigError;
use super::types::{BackendConfig, IndexerConfig};

const MIB: u64 = 1024 * 1024;

impl IndexerConfig {
    /// Start from the defaults
    #[must_use]
    pub fn builder() -> IndexerConfigBuilder {
        IndexerConfigBuilder {
            config: IndexerConfig::default(),
        }
    }
}

/// Builder for `IndexerConfig`
#[derive(Debug, Clone)]
pub struct IndexerConfigBuilder {
    config: IndexerConfig,
}

impl IndexerConfigBuilder {
    /// Start from an existing configuration, e.g. a preset
    #[must_use]
    pub fn from_config(config: IndexerConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    #[must_use]
    pub fn batch_timeout(mut self, timeout: Duration) -> Self {
        self.config.batch_timeout = timeout;
        self
    }

    #[must_use]
    pub fn worker_count(mut self, workers: usize) -> Self {
        self.config.worker_count = Some(workers);
        self
    }

    #[must_use]
    pub fn max_retry_attempts(mut self, attempts: u32) -> Self {
        self.config.max_retry_attempts = attempts;
        self
    }

    #[must_use]
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config.retry_delay = delay;
        self
    }

    #[must_use]
    pub fn max_queue_size(mut self, size: usize) -> Self {
        self.config.max_queue_size = size;
        self
    }

    /// Warning threshold in bytes
    #[must_use]
    pub fn memory_warning_threshold(mut self, bytes: u64) -> Self {
        self.config.memory_warning_threshold = bytes;
        self
    }

    /// Hard admission limit in bytes
    #[must_use]
    pub fn memory_limit_threshold(mut self, bytes: u64) -> Self {
        self.config.memory_limit_threshold = bytes;
        self
    }

    /// Convenience for setting both memory thresholds in MiB
    #[must_use]
    pub fn memory_thresholds_mb(mut self, warning_mb: u64, limit_mb: u64) -> Self {
        self.config.memory_warning_threshold = warning_mb.saturating_mul(MIB);
        self.config.memory_limit_threshold = limit_mb.saturating_mul(MIB);
        self
    }

    #[must_use]
    pub fn real_time_indexing(mut self, enabled: bool) -> Self {
        self.config.enable_real_time_indexing = enabled;
        self
    }

    #[must_use]
    pub fn failed_log_capacity(mut self, capacity: usize) -> Self {
        self.config.failed_log_capacity = capacity;
        self
    }

    #[must_use]
    pub fn index_nsfw_content(mut self, enabled: bool) -> Self {
        self.config.index_nsfw_content = enabled;
        self
    }

    #[must_use]
    pub fn index_spam_content(mut self, enabled: bool) -> Self {
        self.config.index_spam_content = enabled;
        self
    }

    #[must_use]
    pub fn spam_threshold(mut self, threshold: f32) -> Self {
        self.config.spam_threshold = threshold;
        self
    }

    #[must_use]
    pub fn min_quality_score(mut self, score: f32) -> Self {
        self.config.min_quality_score = score;
        self
    }

    #[must_use]
    pub fn block_user(mut self, user_id: impl Into<String>) -> Self {
        self.config.blocked_users.push(user_id.into());
        self
    }

    /// Hashtags are compared lowercase and without the leading `#`
    #[must_use]
    pub fn block_hashtag(mut self, hashtag: impl AsRef<str>) -> Self {
        let tag = hashtag.as_ref().trim_start_matches('#').to_lowercase();
        self.config.blocked_hashtags.push(tag);
        self
    }

    pub fn build(self) -> Result<IndexerConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// Type state for the backend builder
pub struct WithHosts;

impl BackendConfig {
    /// Start from the defaults; a host must be added before building
    #[must_use]
    pub fn builder() -> BackendConfigBuilder<()> {
        let config = BackendConfig {
            hosts: Vec::new(),
            ..BackendConfig::default()
        };
        BackendConfigBuilder {
            config,
            _state: PhantomData,
        }
    }
}

/// Builder for `BackendConfig`
pub struct BackendConfigBuilder<State = ()> {
    config: BackendConfig,
    _state: PhantomData<State>,
}

impl BackendConfigBuilder<()> {
    /// Start from a preset, discarding its hosts
    #[must_use]
    pub fn from_preset(config: BackendConfig) -> Self {
        BackendConfigBuilder {
            config: BackendConfig {
                hosts: Vec::new(),
                ..config
            },
            _state: PhantomData,
        }
    }

    /// Start from an existing configuration whose hosts are already set
    #[must_use]
    pub fn from_config(config: BackendConfig) -> BackendConfigBuilder<WithHosts> {
        BackendConfigBuilder {
            config,
            _state: PhantomData,
        }
    }
}

impl<State> BackendConfigBuilder<State> {
    fn transition<Next>(self) -> BackendConfigBuilder<Next> {
        BackendConfigBuilder {
            config: self.config,
            _state: PhantomData,
        }
    }

    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> BackendConfigBuilder<WithHosts> {
        self.config.hosts.push(host.into());
        self.transition()
    }

    #[must_use]
    pub fn hosts<I, S>(mut self, hosts: I) -> BackendConfigBuilder<WithHosts>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.hosts.extend(hosts.into_iter().map(Into::into));
        self.transition()
    }

    #[must_use]
    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.username = Some(username.into());
        self.config.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.config.connection_timeout = timeout;
        self
    }

    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn notes_index(mut self, index: impl Into<String>) -> Self {
        self.config.notes_index = index.into();
        self
    }

    #[must_use]
    pub fn create_index_on_startup(mut self, enabled: bool) -> Self {
        self.config.create_index_on_startup = enabled;
        self
    }

    #[must_use]
    pub fn shards(mut self, shards: u32, replicas: u32) -> Self {
        self.config.number_of_shards = shards;
        self.config.number_of_replicas = replicas;
        self
    }

    #[must_use]
    pub fn bulk_batch_size(mut self, size: usize) -> Self {
        self.config.bulk_batch_size = size;
        self
    }

    #[must_use]
    pub fn bulk_flush_interval(mut self, interval: Duration) -> Self {
        self.config.bulk_flush_interval = interval;
        self
    }

    #[must_use]
    pub fn request_cache(mut self, enabled: bool) -> Self {
        self.config.enable_request_cache = enabled;
        self
    }

    #[must_use]
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.cache_ttl = ttl;
        self
    }

    #[must_use]
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.config.cache_capacity = capacity;
        self
    }

    #[must_use]
    pub fn slow_operation_threshold(mut self, threshold: Duration) -> Self {
        self.config.slow_operation_threshold = threshold;
        self
    }

    #[must_use]
    pub fn slow_log_capacity(mut self, capacity: usize) -> Self {
        self.config.slow_log_capacity = capacity;
        self
    }
}

impl BackendConfigBuilder<WithHosts> {
    pub fn build(self) -> Result<BackendConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
