//! Per-target work spawned by a poll cycle

use crate::metrics_api::MetricsApi;
use crate::models::{
    sentinel_report, status_key, MetricName, MetricSample, MonitorTarget, WindowKey, SENTINEL,
};
use crate::observability::StructuredLogger;
use crate::probe::LatencyProbe;
use crate::store::WindowedStore;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Result of scraping one target's containers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrapeOutcome {
    pub host: String,
    /// Metrics API failed and sentinels were recorded instead
    pub degraded: bool,
    pub cancelled: bool,
    pub samples_written: usize,
    pub sentinel_samples: usize,
    pub store_errors: usize,
}

/// Result of probing one target's latency
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LatencyOutcome {
    pub host: String,
    /// Stored value, `-1` when the probe failed; `None` if cancelled
    pub latency_ms: Option<f64>,
    pub store_error: bool,
}

/// Fetch a target's metrics and append every value concurrently.
///
/// A metrics API failure degrades the whole target to sentinel values and
/// marks the host down. All write tasks are joined before this returns.
pub(super) async fn scrape_target(
    api: Arc<dyn MetricsApi>,
    store: WindowedStore,
    target: MonitorTarget,
    logger: StructuredLogger,
    cancel: CancellationToken,
) -> ScrapeOutcome {
    let mut outcome = ScrapeOutcome {
        host: target.host.clone(),
        ..Default::default()
    };

    let fetched = tokio::select! {
        _ = cancel.cancelled() => {
            outcome.cancelled = true;
            return outcome;
        }
        fetched = api.fetch(&target.host, &target.containers) => fetched,
    };

    let report = match fetched {
        Ok(report) => report,
        Err(e) => {
            logger.log_target_degraded(&target.host, target.containers.len(), &e.to_string());
            outcome.degraded = true;
            sentinel_report(&target.containers)
        }
    };

    if let Err(e) = store.set_host_status(&target.host, !outcome.degraded).await {
        outcome.store_errors += 1;
        logger.log_store_failure(&status_key(&target.host), &e.to_string());
    }

    let mut writes = JoinSet::new();
    for (container, metrics) in &report {
        for (metric, value) in metrics.values() {
            let sample = MetricSample {
                key: WindowKey::container(metric, &target.host, container.as_str()),
                value,
            };
            let store = store.clone();
            writes.spawn(async move {
                let result = store.record(&sample).await;
                (sample, result)
            });
        }
    }

    loop {
        let joined = tokio::select! {
            _ = cancel.cancelled() => {
                // Dropping the set aborts writes still in flight
                outcome.cancelled = true;
                break;
            }
            joined = writes.join_next() => joined,
        };
        let Some(joined) = joined else { break };

        match joined {
            Ok((sample, Ok(_))) => {
                outcome.samples_written += 1;
                if sample.value == SENTINEL {
                    outcome.sentinel_samples += 1;
                }
            }
            Ok((sample, Err(e))) => {
                outcome.store_errors += 1;
                logger.log_store_failure(&sample.key.to_string(), &e.to_string());
            }
            Err(e) => {
                outcome.store_errors += 1;
                warn!(host = %target.host, error = %e, "Store write task aborted");
            }
        }
    }

    debug!(
        host = %target.host,
        written = outcome.samples_written,
        store_errors = outcome.store_errors,
        degraded = outcome.degraded,
        "Scrape task complete"
    );
    outcome
}

/// Probe a target's latency and append it under its host-only key
pub(super) async fn probe_target(
    probe: LatencyProbe,
    store: WindowedStore,
    host: String,
    logger: StructuredLogger,
    cancel: CancellationToken,
) -> LatencyOutcome {
    let key = WindowKey::host(MetricName::NetworkLatency, &host);
    // The probe sees the port, if any; the window key never does
    let destination = host.clone();

    let latency_ms = tokio::select! {
        _ = cancel.cancelled() => {
            return LatencyOutcome { host, ..Default::default() };
        }
        latency_ms = probe.measure(&destination) => latency_ms,
    };

    let store_error = match store.append(&key, latency_ms).await {
        Ok(_) => false,
        Err(e) => {
            logger.log_store_failure(&key.to_string(), &e.to_string());
            true
        }
    };

    LatencyOutcome {
        host,
        latency_ms: Some(latency_ms),
        store_error,
    }
}
