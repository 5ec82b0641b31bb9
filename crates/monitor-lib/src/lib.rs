//! Core library for the container metrics monitor
//!
//! This crate provides the core functionality for:
//! - Deriving per-container metrics from raw runtime stats
//! - A bounded sliding-window store for every metric series
//! - Host latency probing
//! - The concurrent poll loop and its batch-ready notification
//! - Health checks and observability

pub mod error;
pub mod health;
pub mod metrics_api;
pub mod models;
pub mod notify;
pub mod observability;
pub mod poller;
pub mod probe;
pub mod stats;
pub mod store;

pub use error::{DecodeError, MonitorError, StoreError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use metrics_api::{HttpMetricsApi, MetricsApi};
pub use models::*;
pub use notify::{ChannelHub, Notifier, Publisher};
pub use observability::{MonitorMetrics, StructuredLogger};
pub use poller::{CycleReport, PollConfig, Poller, PollerBuilder};
pub use probe::{LatencyProbe, Pinger, TcpPinger};
pub use store::{ListBackend, MemoryBackend, WindowedStore};
