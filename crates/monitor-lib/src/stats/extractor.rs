//! Derivation of the eight container metrics from a stats document
//!
//! All functions here are pure. Byte counters are summed as integers and
//! scaled to megabytes once, so per-device values are never truncated.

use super::schema::StatsDocument;
use crate::error::DecodeError;
use crate::models::{ContainerMetrics, SENTINEL};

/// Bytes per megabyte, and nanoseconds per millisecond for CPU time
const SCALE: f64 = 1e6;

/// Run state of a container as reported by the runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Running,
    /// Present but in another state (`exited`, `paused`, ...)
    Stopped(String),
    Missing,
}

impl RunState {
    pub fn is_running(&self) -> bool {
        matches!(self, RunState::Running)
    }
}

/// Produce the metric set for a container given its state and stats.
///
/// A container that is not running yields the sentinel set and its stats
/// document, if any, is ignored.
pub fn extract(state: &RunState, stats: Option<&StatsDocument>) -> Result<ContainerMetrics, DecodeError> {
    match (state, stats) {
        (RunState::Running, Some(doc)) => derive(doc),
        (RunState::Running, None) => Err(DecodeError::MissingField("stats")),
        _ => Ok(ContainerMetrics::sentinel()),
    }
}

/// Derive all eight metrics from a running container's stats document
pub fn derive(doc: &StatsDocument) -> Result<ContainerMetrics, DecodeError> {
    let (cpu_absolute_usage, cpu_percent_usage) = cpu_usage(doc)?;
    let (memory_absolute_usage, memory_percent_usage) = memory_usage(doc)?;
    let (network_input, network_output) = network_io(doc);
    let (disk_read, disk_write) = disk_io(doc);

    Ok(ContainerMetrics {
        cpu_absolute_usage,
        cpu_percent_usage,
        memory_absolute_usage,
        memory_percent_usage,
        network_input,
        network_output,
        disk_read,
        disk_write,
    })
}

/// Returns `(cpu_absolute_usage, cpu_percent_usage)`.
///
/// A zero or negative system delta means no measurable interval elapsed,
/// reported as 0% rather than NaN or infinity.
pub fn cpu_usage(doc: &StatsDocument) -> Result<(f64, f64), DecodeError> {
    let current = &doc.cpu_stats;
    let previous = &doc.precpu_stats;

    let system_now = current
        .system_cpu_usage
        .ok_or(DecodeError::MissingField("cpu_stats.system_cpu_usage"))?;
    let system_before = previous.system_cpu_usage.unwrap_or(0);

    // Counter resets after a container restart show up as a negative delta
    let cpu_delta = current
        .cpu_usage
        .total_usage
        .saturating_sub(previous.cpu_usage.total_usage) as f64;
    let system_delta = system_now.saturating_sub(system_before) as f64;

    let percent = if system_delta > 0.0 {
        (cpu_delta / system_delta) * core_count(doc) as f64 * 100.0
    } else {
        0.0
    };

    Ok((cpu_delta / SCALE, percent))
}

/// Number of cores the percentage is scaled by
pub fn core_count(doc: &StatsDocument) -> usize {
    match &doc.cpu_stats.cpu_usage.percpu_usage {
        Some(per_core) if !per_core.is_empty() => per_core.len(),
        _ => doc
            .cpu_stats
            .online_cpus
            .filter(|n| *n > 0)
            .map(|n| n as usize)
            .unwrap_or(1),
    }
}

/// Returns `(memory_absolute_usage, memory_percent_usage)`.
///
/// A zero limit leaves the percentage undefined and it is reported as the sentinel.
pub fn memory_usage(doc: &StatsDocument) -> Result<(f64, f64), DecodeError> {
    let usage = doc
        .memory_stats
        .usage
        .ok_or(DecodeError::MissingField("memory_stats.usage"))?;
    let limit = doc
        .memory_stats
        .limit
        .ok_or(DecodeError::MissingField("memory_stats.limit"))?;

    let percent = if limit == 0 {
        SENTINEL
    } else {
        (usage as f64 / limit as f64) * 100.0
    };

    Ok((usage as f64 / SCALE, percent))
}

/// Returns `(network_input, network_output)` in megabytes across all interfaces
pub fn network_io(doc: &StatsDocument) -> (f64, f64) {
    let (rx, tx) = doc
        .networks
        .iter()
        .flat_map(|interfaces| interfaces.values())
        .fold((0u64, 0u64), |(rx, tx), iface| {
            (rx.saturating_add(iface.rx_bytes), tx.saturating_add(iface.tx_bytes))
        });

    (rx as f64 / SCALE, tx as f64 / SCALE)
}

/// Returns `(disk_read, disk_write)` in megabytes across all block devices
pub fn disk_io(doc: &StatsDocument) -> (f64, f64) {
    let mut read = 0u64;
    let mut write = 0u64;

    for entry in doc.blkio_stats.io_service_bytes_recursive.iter().flatten() {
        // cgroup v2 hosts report lowercase op names
        if entry.op.eq_ignore_ascii_case("read") {
            read = read.saturating_add(entry.value);
        } else if entry.op.eq_ignore_ascii_case("write") {
            write = write.saturating_add(entry.value);
        }
    }

    (read as f64 / SCALE, write as f64 / SCALE)
}
