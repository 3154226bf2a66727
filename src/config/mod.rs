//! Configuration for the note indexing pipeline
//!
//! Two independent configurations are exposed: `IndexerConfig` drives the
//! task scheduler, worker pool and content filtering, while `BackendConfig`
//! describes how to reach the search backend. Both can be built fluently,
//! taken from a preset, or loaded from environment variables.

pub mod builder;
pub mod env;
pub mod errors;
pub mod types;

pub use builder::{BackendConfigBuilder, IndexerConfigBuilder, WithHosts};
pub use errors::ConfigError;
pub use types::{BackendConfig, IndexerConfig};

#[cfg(test)]
mod tests;
