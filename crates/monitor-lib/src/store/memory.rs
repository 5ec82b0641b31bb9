//! In-process list backend

use super::ListBackend;
use crate::error::StoreError;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::VecDeque;

/// Sharded map of lists. Each push-and-trim runs under the write guard of the
/// key's shard, so unrelated keys on other shards never contend.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    lists: DashMap<String, VecDeque<f64>>,
    flags: DashMap<String, bool>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently holding a window
    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }
}

#[async_trait]
impl ListBackend for MemoryBackend {
    async fn push_bounded(&self, key: &str, value: f64, capacity: usize) -> Result<usize, StoreError> {
        let mut list = self.lists.entry(key.to_string()).or_default();
        list.push_back(value);
        if list.len() > capacity {
            list.pop_front();
        }
        Ok(list.len())
    }

    async fn range(&self, key: &str) -> Result<Vec<f64>, StoreError> {
        Ok(self
            .lists
            .get(key)
            .map(|list| list.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn set_flag(&self, key: &str, value: bool) -> Result<(), StoreError> {
        self.flags.insert(key.to_string(), value);
        Ok(())
    }

    async fn flag(&self, key: &str) -> Result<Option<bool>, StoreError> {
        Ok(self.flags.get(key).map(|flag| *flag))
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.lists.clear();
        self.flags.clear();
        Ok(())
    }
}
