//! Error taxonomy for collection, storage and probing
//!
//! Every per-container, per-host and per-metric failure is isolated by the
//! caller and degraded to the sentinel value; only [`MonitorError::Config`]
//! is fatal, and only at startup.

use thiserror::Error;

/// Stats document could not be turned into metrics
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed stats payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("stats payload is missing `{0}`")]
    MissingField(&'static str),
}

/// Failure of the backing list store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("write to `{key}` failed: {reason}")]
    Write { key: String, reason: String },
}

#[derive(Debug, Error)]
pub enum MonitorError {
    /// Metrics API or container runtime could not be reached
    #[error("transport error talking to {endpoint}: {reason}")]
    Transport { endpoint: String, reason: String },

    #[error("container `{0}` not found or not running")]
    NotRunning(String),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("latency probe to {host} failed: {reason}")]
    Probe { host: String, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl MonitorError {
    pub fn transport(endpoint: impl Into<String>, reason: impl ToString) -> Self {
        MonitorError::Transport {
            endpoint: endpoint.into(),
            reason: reason.to_string(),
        }
    }

    pub fn probe(host: impl Into<String>, reason: impl ToString) -> Self {
        MonitorError::Probe {
            host: host.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T, E = MonitorError> = std::result::Result<T, E>;
