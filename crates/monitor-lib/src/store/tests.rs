//! Window store tests against the in-process backend

use super::*;
use crate::models::MetricName;
use std::collections::HashSet;

fn key(container: &str) -> WindowKey {
    WindowKey::container(MetricName::CpuPercentUsage, "10.0.0.5:8080", container)
}

#[tokio::test]
async fn test_append_creates_window() {
    let store = WindowedStore::in_memory(3).unwrap();
    assert!(store.window(&key("web")).await.unwrap().is_empty());

    let len = store.append(&key("web"), 1.5).await.unwrap();

    assert_eq!(len, 1);
    assert_eq!(store.window(&key("web")).await.unwrap(), vec![1.5]);
}

#[tokio::test]
async fn test_eviction_keeps_most_recent_values_in_order() {
    let window_size = 4;
    let store = WindowedStore::in_memory(window_size).unwrap();

    for i in 1..=10 {
        let len = store.append(&key("web"), i as f64).await.unwrap();
        assert!(len <= window_size);
    }

    assert_eq!(
        store.window(&key("web")).await.unwrap(),
        vec![7.0, 8.0, 9.0, 10.0]
    );
}

#[tokio::test]
async fn test_window_of_one() {
    let store = WindowedStore::in_memory(1).unwrap();
    store.append(&key("web"), 1.0).await.unwrap();
    store.append(&key("web"), 2.0).await.unwrap();

    assert_eq!(store.window(&key("web")).await.unwrap(), vec![2.0]);
}

#[tokio::test]
async fn test_zero_window_size_rejected() {
    let result = WindowedStore::in_memory(0);
    assert!(matches!(result, Err(MonitorError::Config(_))));
}

#[tokio::test]
async fn test_keys_are_independent() {
    let store = WindowedStore::in_memory(2).unwrap();
    let latency = WindowKey::host(MetricName::NetworkLatency, "10.0.0.5");

    store.append(&key("web"), 1.0).await.unwrap();
    store.append(&key("db"), 2.0).await.unwrap();
    store.append(&latency, 0.4).await.unwrap();

    assert_eq!(store.window(&key("web")).await.unwrap(), vec![1.0]);
    assert_eq!(store.window(&key("db")).await.unwrap(), vec![2.0]);
    assert_eq!(store.window(&latency).await.unwrap(), vec![0.4]);
}

#[tokio::test]
async fn test_record_uses_sample_key() {
    let store = WindowedStore::in_memory(5).unwrap();
    let sample = MetricSample {
        key: key("web"),
        value: -1.0,
    };

    store.record(&sample).await.unwrap();

    assert_eq!(store.window(&key("web")).await.unwrap(), vec![-1.0]);
}

#[tokio::test]
async fn test_flush_removes_every_window() {
    let backend = Arc::new(MemoryBackend::new());
    let store = WindowedStore::new(backend.clone(), 5).unwrap();
    store.append(&key("web"), 1.0).await.unwrap();
    store.append(&key("db"), 1.0).await.unwrap();
    assert_eq!(backend.len(), 2);

    store.flush().await.unwrap();

    assert!(backend.is_empty());
}

#[tokio::test]
async fn test_host_status_overwrites_and_ignores_port() {
    let store = WindowedStore::in_memory(5).unwrap();
    assert_eq!(store.host_status("10.0.0.5").await.unwrap(), None);

    store.set_host_status("10.0.0.5:8080", true).await.unwrap();
    assert_eq!(store.host_status("10.0.0.5").await.unwrap(), Some(true));

    store.set_host_status("10.0.0.5", false).await.unwrap();
    assert_eq!(store.host_status("10.0.0.5:8080").await.unwrap(), Some(false));
}

#[tokio::test]
async fn test_flush_clears_host_status() {
    let store = WindowedStore::in_memory(5).unwrap();
    store.set_host_status("10.0.0.5", true).await.unwrap();

    store.flush().await.unwrap();

    assert_eq!(store.host_status("10.0.0.5").await.unwrap(), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_appends_to_same_key_stay_bounded() {
    let window_size = 10;
    let appends = 200;
    let store = WindowedStore::in_memory(window_size).unwrap();

    let mut handles = Vec::new();
    for i in 0..appends {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.append(&key("web"), i as f64).await.unwrap()
        }));
    }

    for handle in handles {
        let observed_len = handle.await.unwrap();
        assert!(observed_len <= window_size);
    }

    let window = store.window(&key("web")).await.unwrap();
    assert_eq!(window.len(), window_size);

    // No duplication: every survivor is a distinct submitted value
    let distinct: HashSet<u64> = window.iter().map(|v| *v as u64).collect();
    assert_eq!(distinct.len(), window_size);
    assert!(window.iter().all(|v| *v >= 0.0 && *v < appends as f64));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_fewer_concurrent_appends_than_capacity_keeps_all() {
    let store = WindowedStore::in_memory(50).unwrap();

    let mut handles = Vec::new();
    for i in 0..20 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.append(&key("web"), i as f64).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let mut window = store.window(&key("web")).await.unwrap();
    window.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let expected: Vec<f64> = (0..20).map(|i| i as f64).collect();
    assert_eq!(window, expected);
}

/// Backend that records the order in which pushes were applied
#[derive(Default)]
struct OrderedBackend {
    inner: MemoryBackend,
    applied: tokio::sync::Mutex<Vec<f64>>,
}

#[async_trait]
impl ListBackend for OrderedBackend {
    async fn push_bounded(&self, key: &str, value: f64, capacity: usize) -> Result<usize, StoreError> {
        // Hold the log lock across the push so log order equals apply order
        let mut applied = self.applied.lock().await;
        let len = self.inner.push_bounded(key, value, capacity).await?;
        applied.push(value);
        Ok(len)
    }

    async fn range(&self, key: &str) -> Result<Vec<f64>, StoreError> {
        self.inner.range(key).await
    }

    async fn set_flag(&self, key: &str, value: bool) -> Result<(), StoreError> {
        self.inner.set_flag(key, value).await
    }

    async fn flag(&self, key: &str) -> Result<Option<bool>, StoreError> {
        self.inner.flag(key).await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.inner.clear().await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_survivors_are_last_by_apply_order() {
    let window_size = 5;
    let backend = Arc::new(OrderedBackend::default());
    let store = WindowedStore::new(backend.clone(), window_size).unwrap();

    let mut handles = Vec::new();
    for i in 0..64 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.append(&key("web"), i as f64).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let applied = backend.applied.lock().await.clone();
    let expected = applied[applied.len() - window_size..].to_vec();
    assert_eq!(store.window(&key("web")).await.unwrap(), expected);
}
