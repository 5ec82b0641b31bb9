//! Container stats extraction
//!
//! Turns raw per-container runtime stats into the eight derived metrics:
//! CPU (absolute and percent), memory (absolute and percent), network
//! input/output and disk read/write.

pub mod extractor;
mod inspector;
mod schema;
mod service;

#[cfg(test)]
mod tests;

pub use extractor::{extract, RunState};
pub use inspector::ContainerInspector;
#[cfg(feature = "docker")]
pub use inspector::DockerInspector;
pub use schema::{BlkioEntry, BlkioStats, CpuStats, CpuUsage, InterfaceStats, MemoryStats, StatsDocument};
pub use service::{collect_container, StatsService};
