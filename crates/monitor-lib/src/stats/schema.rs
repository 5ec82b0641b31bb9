//! Typed schema of the container runtime stats document
//!
//! Mirrors the subset of the Docker Engine `/containers/{id}/stats` payload
//! the extractor reads. Counters the runtime may omit or send as `null` are
//! optional; the extractor decides which absences are fatal for a container.

use crate::error::DecodeError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsDocument {
    /// Per-interface counters; absent when the container has no network
    #[serde(default)]
    pub networks: Option<HashMap<String, InterfaceStats>>,
    #[serde(default)]
    pub blkio_stats: BlkioStats,
    pub cpu_stats: CpuStats,
    #[serde(default)]
    pub precpu_stats: CpuStats,
    pub memory_stats: MemoryStats,
}

impl StatsDocument {
    pub fn from_json(raw: &[u8]) -> Result<Self, DecodeError> {
        Ok(serde_json::from_slice(raw)?)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, DecodeError> {
        Ok(serde_json::from_value(value)?)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterfaceStats {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlkioStats {
    #[serde(default)]
    pub io_service_bytes_recursive: Option<Vec<BlkioEntry>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlkioEntry {
    /// Operation tag: `Read`, `Write`, `Sync`, `Async`, `Total`, ...
    pub op: String,
    pub value: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuStats {
    #[serde(default)]
    pub cpu_usage: CpuUsage,
    /// Cumulative host CPU time in nanoseconds
    #[serde(default)]
    pub system_cpu_usage: Option<u64>,
    #[serde(default)]
    pub online_cpus: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuUsage {
    /// Cumulative container CPU time in nanoseconds
    #[serde(default)]
    pub total_usage: u64,
    /// Only reported on cgroup v1 hosts
    #[serde(default)]
    pub percpu_usage: Option<Vec<u64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    #[serde(default)]
    pub usage: Option<u64>,
    #[serde(default)]
    pub limit: Option<u64>,
}
