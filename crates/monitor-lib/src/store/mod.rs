//! Bounded sliding-window store
//!
//! Every [`WindowKey`] owns one FIFO window of at most `window_size` samples.
//! Appends push to the tail and evict the head in one atomic step per key,
//! so concurrent writers can never observe or leave an oversized window.
//! Each host also has an up/down flag set once per cycle.
//!
//! The storage itself sits behind [`ListBackend`]: the in-process
//! [`MemoryBackend`] by default, or Redis with the `redis` feature.

mod memory;
#[cfg(feature = "redis")]
mod redis;

#[cfg(test)]
mod tests;

pub use memory::MemoryBackend;
#[cfg(feature = "redis")]
pub use self::redis::RedisBackend;

use crate::error::{MonitorError, StoreError};
use crate::models::{status_key, MetricSample, WindowKey};
use async_trait::async_trait;
use std::sync::Arc;

/// List primitives of the backing store, keyed by string
#[async_trait]
pub trait ListBackend: Send + Sync {
    /// Push `value` to the tail of `key` and, if the list then holds more than
    /// `capacity` items, pop exactly one from the head. Must be atomic per key.
    /// Returns the resulting length.
    async fn push_bounded(&self, key: &str, value: f64, capacity: usize) -> Result<usize, StoreError>;

    /// Full contents of `key`, oldest first
    async fn range(&self, key: &str) -> Result<Vec<f64>, StoreError>;

    /// Set a boolean flag under `key`, replacing any previous value
    async fn set_flag(&self, key: &str, value: bool) -> Result<(), StoreError>;

    /// Current flag under `key`, `None` if never set
    async fn flag(&self, key: &str) -> Result<Option<bool>, StoreError>;

    /// Drop every list and flag
    async fn clear(&self) -> Result<(), StoreError>;
}

/// Sliding-window store shared by all collection tasks
#[derive(Clone)]
pub struct WindowedStore {
    backend: Arc<dyn ListBackend>,
    window_size: usize,
}

impl WindowedStore {
    pub fn new(backend: Arc<dyn ListBackend>, window_size: usize) -> Result<Self, MonitorError> {
        if window_size == 0 {
            return Err(MonitorError::Config(
                "window size must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            backend,
            window_size,
        })
    }

    /// Store backed by a fresh in-process backend
    pub fn in_memory(window_size: usize) -> Result<Self, MonitorError> {
        Self::new(Arc::new(MemoryBackend::new()), window_size)
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Append a value to the window for `key`, evicting the oldest if full
    pub async fn append(&self, key: &WindowKey, value: f64) -> Result<usize, StoreError> {
        self.backend
            .push_bounded(&key.to_string(), value, self.window_size)
            .await
    }

    pub async fn record(&self, sample: &MetricSample) -> Result<usize, StoreError> {
        self.append(&sample.key, sample.value).await
    }

    /// Current contents of the window for `key`, oldest first
    pub async fn window(&self, key: &WindowKey) -> Result<Vec<f64>, StoreError> {
        self.backend.range(&key.to_string()).await
    }

    /// Record whether `host` answered its metrics API this cycle
    pub async fn set_host_status(&self, host: &str, up: bool) -> Result<(), StoreError> {
        self.backend.set_flag(&status_key(host), up).await
    }

    pub async fn host_status(&self, host: &str) -> Result<Option<bool>, StoreError> {
        self.backend.flag(&status_key(host)).await
    }

    /// Remove every window
    pub async fn flush(&self) -> Result<(), StoreError> {
        self.backend.clear().await
    }
}
