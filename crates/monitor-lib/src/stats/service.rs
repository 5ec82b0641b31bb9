//! Per-container stats collection for the metrics API

use super::extractor;
use super::inspector::ContainerInspector;
use crate::error::{MonitorError, Result};
use crate::models::{sentinel_report, ContainerMetrics, MetricsReport};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Answers metrics API requests against a container runtime
#[derive(Clone)]
pub struct StatsService {
    inspector: Arc<dyn ContainerInspector>,
}

impl StatsService {
    pub fn new(inspector: Arc<dyn ContainerInspector>) -> Self {
        Self { inspector }
    }

    /// Collect the metric set for every named container.
    ///
    /// Containers are inspected concurrently. Any failure for one container
    /// leaves the sentinel set in its slot and does not affect the others.
    pub async fn collect(&self, containers: &[String]) -> MetricsReport {
        let mut report = sentinel_report(containers);
        let mut tasks = JoinSet::new();

        for name in report.keys().cloned() {
            let inspector = self.inspector.clone();
            tasks.spawn(async move {
                let metrics = collect_container(inspector.as_ref(), &name).await;
                (name, metrics)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, metrics)) => {
                    report.insert(name, metrics);
                }
                Err(e) => warn!(error = %e, "Container stats task aborted"),
            }
        }

        report
    }
}

/// Collect one container, degrading every failure to the sentinel set
pub async fn collect_container(inspector: &dyn ContainerInspector, name: &str) -> ContainerMetrics {
    match try_collect(inspector, name).await {
        Ok(metrics) => {
            debug!(container = %name, cpu_percent = metrics.cpu_percent_usage, "Derived container metrics");
            metrics
        }
        Err(MonitorError::NotRunning(_)) => {
            info!(container = %name, "Container not found or not running");
            ContainerMetrics::sentinel()
        }
        Err(e) => {
            warn!(container = %name, error = %e, "Failed to collect container stats");
            ContainerMetrics::sentinel()
        }
    }
}

/// Inspect, then read stats only if the container is running
async fn try_collect(inspector: &dyn ContainerInspector, name: &str) -> Result<ContainerMetrics> {
    let state = inspector.state(name).await?;
    if !state.is_running() {
        return Err(MonitorError::NotRunning(name.to_string()));
    }

    let doc = inspector.stats(name).await?;
    Ok(extractor::extract(&state, Some(&doc))?)
}
