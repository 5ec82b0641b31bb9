//! Core data models for the container metrics monitor

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Value recorded when a metric could not be obtained
pub const SENTINEL: f64 = -1.0;

/// Names of every metric the monitor records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricName {
    CpuAbsoluteUsage,
    CpuPercentUsage,
    MemoryAbsoluteUsage,
    MemoryPercentUsage,
    NetworkInput,
    NetworkOutput,
    DiskRead,
    DiskWrite,
    NetworkLatency,
}

impl MetricName {
    /// The eight per-container metrics, in reporting order
    pub const CONTAINER: [MetricName; 8] = [
        MetricName::CpuAbsoluteUsage,
        MetricName::CpuPercentUsage,
        MetricName::MemoryAbsoluteUsage,
        MetricName::MemoryPercentUsage,
        MetricName::NetworkInput,
        MetricName::NetworkOutput,
        MetricName::DiskRead,
        MetricName::DiskWrite,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::CpuAbsoluteUsage => "cpu_absolute_usage",
            MetricName::CpuPercentUsage => "cpu_percent_usage",
            MetricName::MemoryAbsoluteUsage => "memory_absolute_usage",
            MetricName::MemoryPercentUsage => "memory_percent_usage",
            MetricName::NetworkInput => "network_input",
            MetricName::NetworkOutput => "network_output",
            MetricName::DiskRead => "disk_read",
            MetricName::DiskWrite => "disk_write",
            MetricName::NetworkLatency => "network_latency",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The eight derived metrics for one container in one cycle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContainerMetrics {
    pub cpu_absolute_usage: f64,
    pub cpu_percent_usage: f64,
    pub memory_absolute_usage: f64,
    pub memory_percent_usage: f64,
    pub network_input: f64,
    pub network_output: f64,
    pub disk_read: f64,
    pub disk_write: f64,
}

impl ContainerMetrics {
    /// Metric set reported for an absent, stopped or unreachable container
    pub fn sentinel() -> Self {
        Self {
            cpu_absolute_usage: SENTINEL,
            cpu_percent_usage: SENTINEL,
            memory_absolute_usage: SENTINEL,
            memory_percent_usage: SENTINEL,
            network_input: SENTINEL,
            network_output: SENTINEL,
            disk_read: SENTINEL,
            disk_write: SENTINEL,
        }
    }

    /// True when every value is the sentinel
    pub fn is_sentinel(&self) -> bool {
        self.values().all(|(_, v)| v == SENTINEL)
    }

    /// Iterate `(metric, value)` pairs in reporting order
    pub fn values(&self) -> impl Iterator<Item = (MetricName, f64)> + '_ {
        MetricName::CONTAINER
            .into_iter()
            .map(move |m| (m, self.get(m)))
    }

    /// Value of a per-container metric; `network_latency` has no container value
    pub fn get(&self, metric: MetricName) -> f64 {
        match metric {
            MetricName::CpuAbsoluteUsage => self.cpu_absolute_usage,
            MetricName::CpuPercentUsage => self.cpu_percent_usage,
            MetricName::MemoryAbsoluteUsage => self.memory_absolute_usage,
            MetricName::MemoryPercentUsage => self.memory_percent_usage,
            MetricName::NetworkInput => self.network_input,
            MetricName::NetworkOutput => self.network_output,
            MetricName::DiskRead => self.disk_read,
            MetricName::DiskWrite => self.disk_write,
            MetricName::NetworkLatency => SENTINEL,
        }
    }
}

/// Response of the metrics API: container name to its metric set
pub type MetricsReport = BTreeMap<String, ContainerMetrics>;

/// Build a report holding the sentinel set for every listed container
pub fn sentinel_report(containers: &[String]) -> MetricsReport {
    containers
        .iter()
        .map(|name| (name.clone(), ContainerMetrics::sentinel()))
        .collect()
}

/// Strip any `:port` suffix from a host identifier
pub fn strip_port(host: &str) -> &str {
    host.split(':').next().unwrap_or(host)
}

/// Identity of one time series in the window store
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowKey {
    pub metric: MetricName,
    /// Host with any port suffix removed
    pub host: String,
    pub container: Option<String>,
}

impl WindowKey {
    pub fn container(metric: MetricName, host: &str, container: impl Into<String>) -> Self {
        Self {
            metric,
            host: strip_port(host).to_string(),
            container: Some(container.into()),
        }
    }

    pub fn host(metric: MetricName, host: &str) -> Self {
        Self {
            metric,
            host: strip_port(host).to_string(),
            container: None,
        }
    }
}

/// Renders the backing-store key, e.g. `metric:disk_read:host:10.0.0.5:container:web`
impl fmt::Display for WindowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "metric:{}:host:{}", self.metric, self.host)?;
        if let Some(container) = &self.container {
            write!(f, ":container:{}", container)?;
        }
        Ok(())
    }
}

/// Backing-store key of a host's up/down flag, e.g. `status:host:10.0.0.5`
pub fn status_key(host: &str) -> String {
    format!("status:host:{}", strip_port(host))
}

/// One scalar observation destined for a window
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub key: WindowKey,
    pub value: f64,
}

/// A host and the containers observed on it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorTarget {
    /// Host identifier, optionally with the metrics API port (`10.0.0.5:8080`)
    pub host: String,
    pub containers: Vec<String>,
}

impl MonitorTarget {
    pub fn new(host: impl Into<String>, containers: Vec<String>) -> Self {
        Self {
            host: host.into(),
            containers,
        }
    }
}
