//! Configuration errors

use thiserror::Error;

/// Errors raised while building or validating a configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A field holds a value outside its accepted range
    #[error("Invalid value for `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    /// No backend hosts were supplied
    #[error("No search backend hosts configured")]
    NoHosts,

    /// A backend host could not be parsed as an http(s) URL
    #[error("Invalid search backend host '{host}': {reason}")]
    InvalidHost { host: String, reason: String },

    /// An environment variable was present but unparseable
    #[error("Failed to parse environment variable {var}: {reason}")]
    Env { var: String, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}
