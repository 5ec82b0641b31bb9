//! Tests for metric derivation and the per-container stats service

use super::*;
use crate::error::{DecodeError, MonitorError};
use crate::models::{ContainerMetrics, MetricName};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn approx(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

/// Stats document with a CPU delta of 20 over a system delta of 100 on 2 cores,
/// 500 MB used of a 1 GB limit, two interfaces and two block devices
fn sample_document() -> StatsDocument {
    let raw = r#"{
        "read": "2024-03-01T10:00:00Z",
        "networks": {
            "eth0": {"rx_bytes": 1000000, "tx_bytes": 3000000, "rx_packets": 10},
            "eth1": {"rx_bytes": 2000000, "tx_bytes": 4000000, "rx_packets": 20}
        },
        "blkio_stats": {
            "io_service_bytes_recursive": [
                {"major": 8, "minor": 0, "op": "Read", "value": 1500000},
                {"major": 8, "minor": 0, "op": "Write", "value": 250000},
                {"major": 8, "minor": 16, "op": "Read", "value": 1500000},
                {"major": 8, "minor": 16, "op": "Write", "value": 250000},
                {"major": 8, "minor": 16, "op": "Total", "value": 3500000}
            ]
        },
        "cpu_stats": {
            "cpu_usage": {"total_usage": 1020, "percpu_usage": [510, 510]},
            "system_cpu_usage": 10100,
            "online_cpus": 2
        },
        "precpu_stats": {
            "cpu_usage": {"total_usage": 1000, "percpu_usage": [500, 500]},
            "system_cpu_usage": 10000
        },
        "memory_stats": {"usage": 500000000, "limit": 1000000000}
    }"#;
    StatsDocument::from_json(raw.as_bytes()).unwrap()
}

#[test]
fn test_cpu_formula() {
    let doc = sample_document();
    let (absolute, percent) = extractor::cpu_usage(&doc).unwrap();
    approx(percent, 40.0);
    approx(absolute, 0.00002);
}

#[test]
fn test_core_count_falls_back_to_online_cpus() {
    let mut doc = sample_document();
    doc.cpu_stats.cpu_usage.percpu_usage = None;
    doc.cpu_stats.online_cpus = Some(4);
    assert_eq!(extractor::core_count(&doc), 4);

    doc.cpu_stats.online_cpus = None;
    assert_eq!(extractor::core_count(&doc), 1);
}

#[test]
fn test_zero_system_delta_reports_zero_percent() {
    let mut doc = sample_document();
    doc.precpu_stats.system_cpu_usage = doc.cpu_stats.system_cpu_usage;

    let (_, percent) = extractor::cpu_usage(&doc).unwrap();
    assert_eq!(percent, 0.0);
    assert!(percent.is_finite());
}

#[test]
fn test_memory_formula() {
    let doc = sample_document();
    let (absolute, percent) = extractor::memory_usage(&doc).unwrap();
    approx(percent, 50.0);
    approx(absolute, 500.0);
}

#[test]
fn test_zero_memory_limit_is_undefined() {
    let mut doc = sample_document();
    doc.memory_stats.limit = Some(0);

    let (absolute, percent) = extractor::memory_usage(&doc).unwrap();
    approx(absolute, 500.0);
    assert_eq!(percent, -1.0);
}

#[test]
fn test_network_formula() {
    let doc = sample_document();
    let (input, output) = extractor::network_io(&doc);
    approx(input, 3.0);
    approx(output, 7.0);
}

#[test]
fn test_missing_networks_reports_zero() {
    let mut doc = sample_document();
    doc.networks = None;
    assert_eq!(extractor::network_io(&doc), (0.0, 0.0));
}

#[test]
fn test_disk_sums_before_scaling() {
    let doc = sample_document();
    let (read, write) = extractor::disk_io(&doc);
    // 2 x 1.5 MB reads; per-device truncation would give 2.0
    approx(read, 3.0);
    // 2 x 0.25 MB writes; per-device truncation would give 0.0
    approx(write, 0.5);
}

#[test]
fn test_disk_ops_are_case_insensitive() {
    let mut doc = sample_document();
    doc.blkio_stats.io_service_bytes_recursive = Some(vec![
        BlkioEntry {
            op: "read".to_string(),
            value: 2_000_000,
        },
        BlkioEntry {
            op: "write".to_string(),
            value: 1_000_000,
        },
    ]);
    assert_eq!(extractor::disk_io(&doc), (2.0, 1.0));
}

#[test]
fn test_null_blkio_entries() {
    let raw = r#"{
        "blkio_stats": {"io_service_bytes_recursive": null},
        "cpu_stats": {"cpu_usage": {"total_usage": 0}, "system_cpu_usage": 1},
        "memory_stats": {"usage": 0, "limit": 1}
    }"#;
    let doc = StatsDocument::from_json(raw.as_bytes()).unwrap();
    assert_eq!(extractor::disk_io(&doc), (0.0, 0.0));
}

#[test]
fn test_extract_running_container() {
    let doc = sample_document();
    let metrics = extract(&RunState::Running, Some(&doc)).unwrap();

    approx(metrics.cpu_percent_usage, 40.0);
    approx(metrics.memory_percent_usage, 50.0);
    approx(metrics.network_input, 3.0);
    approx(metrics.disk_write, 0.5);
    assert!(metrics.values().all(|(_, v)| v >= 0.0));
}

#[test]
fn test_extract_stopped_container_is_sentinel() {
    let doc = sample_document();
    let stopped = extract(&RunState::Stopped("exited".into()), Some(&doc)).unwrap();
    let missing = extract(&RunState::Missing, None).unwrap();

    assert_eq!(stopped, ContainerMetrics::sentinel());
    assert_eq!(missing, ContainerMetrics::sentinel());
}

#[test]
fn test_wrong_shape_is_decode_error() {
    let raw = br#"{"cpu_stats": "not an object", "memory_stats": {}}"#;
    let result = StatsDocument::from_json(raw);
    assert!(matches!(result, Err(DecodeError::Malformed(_))));
}

#[test]
fn test_missing_memory_usage_is_decode_error() {
    let mut doc = sample_document();
    doc.memory_stats.usage = None;

    let result = extractor::derive(&doc);
    assert!(matches!(
        result,
        Err(DecodeError::MissingField("memory_stats.usage"))
    ));
}

#[test]
fn test_missing_system_usage_is_decode_error() {
    let mut doc = sample_document();
    doc.cpu_stats.system_cpu_usage = None;
    assert!(extractor::derive(&doc).is_err());
}

/// Inspector serving canned states and documents
struct MockInspector {
    states: HashMap<String, RunState>,
    documents: HashMap<String, StatsDocument>,
    stats_calls: AtomicUsize,
}

impl MockInspector {
    fn new() -> Self {
        Self {
            states: HashMap::new(),
            documents: HashMap::new(),
            stats_calls: AtomicUsize::new(0),
        }
    }

    fn with(mut self, name: &str, state: RunState, doc: Option<StatsDocument>) -> Self {
        self.states.insert(name.to_string(), state);
        if let Some(doc) = doc {
            self.documents.insert(name.to_string(), doc);
        }
        self
    }
}

#[async_trait]
impl ContainerInspector for MockInspector {
    async fn state(&self, container: &str) -> Result<RunState, MonitorError> {
        match container {
            "unreachable" => Err(MonitorError::transport("docker", "connection refused")),
            _ => Ok(self
                .states
                .get(container)
                .cloned()
                .unwrap_or(RunState::Missing)),
        }
    }

    async fn stats(&self, container: &str) -> Result<StatsDocument, MonitorError> {
        self.stats_calls.fetch_add(1, Ordering::SeqCst);
        self.documents
            .get(container)
            .cloned()
            .ok_or(MonitorError::Decode(DecodeError::MissingField("stats")))
    }
}

#[tokio::test]
async fn test_not_running_container_skips_stats_call() {
    let inspector = MockInspector::new().with(
        "worker",
        RunState::Stopped("exited".into()),
        Some(sample_document()),
    );

    let metrics = collect_container(&inspector, "worker").await;

    assert!(metrics.is_sentinel());
    assert_eq!(inspector.stats_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_service_isolates_failures_per_container() {
    let mut malformed = sample_document();
    malformed.memory_stats.limit = None;

    let inspector = Arc::new(
        MockInspector::new()
            .with("web", RunState::Running, Some(sample_document()))
            .with("broken", RunState::Running, Some(malformed))
            .with("stopped", RunState::Stopped("paused".into()), None),
    );
    let service = StatsService::new(inspector.clone());

    let names: Vec<String> = ["web", "broken", "stopped", "ghost", "unreachable"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let report = service.collect(&names).await;

    assert_eq!(report.len(), 5);
    approx(report["web"].get(MetricName::MemoryPercentUsage), 50.0);
    for name in ["broken", "stopped", "ghost", "unreachable"] {
        assert!(report[name].is_sentinel(), "{name} should be sentinel");
    }
    // Only the two running containers reach the stats call
    assert_eq!(inspector.stats_calls.load(Ordering::SeqCst), 2);
}
