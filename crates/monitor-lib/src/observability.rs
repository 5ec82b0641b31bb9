//! Observability for the collector
//!
//! Provides:
//! - Prometheus metrics (cycle duration, store writes and failures, sentinel
//!   samples, probe failures, per-host latency)
//! - Structured JSON lifecycle logging with tracing

use crate::poller::CycleReport;
use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_gauge, GaugeVec,
    Histogram, IntCounter, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for cycle duration (in seconds)
const CYCLE_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

/// Registered once per process; Prometheus rejects duplicate registration
static GLOBAL_METRICS: OnceLock<MonitorMetricsInner> = OnceLock::new();

struct MonitorMetricsInner {
    cycle_duration_seconds: Histogram,
    cycles_completed: IntCounter,
    samples_written: IntCounter,
    sentinel_samples: IntCounter,
    store_errors: IntCounter,
    latency_probe_failures: IntCounter,
    notifications_published: IntCounter,
    degraded_targets: IntGauge,
    targets_monitored: IntGauge,
    containers_monitored: IntGauge,
    host_latency_ms: GaugeVec,
}

impl MonitorMetricsInner {
    fn new() -> Self {
        Self {
            cycle_duration_seconds: register_histogram!(
                "container_monitor_cycle_duration_seconds",
                "Wall time of one poll cycle including the final join",
                CYCLE_BUCKETS.to_vec()
            )
            .expect("Failed to register cycle_duration_seconds"),

            cycles_completed: register_int_counter!(
                "container_monitor_cycles_completed_total",
                "Poll cycles that ran to completion"
            )
            .expect("Failed to register cycles_completed"),

            samples_written: register_int_counter!(
                "container_monitor_samples_written_total",
                "Samples appended to the window store"
            )
            .expect("Failed to register samples_written"),

            sentinel_samples: register_int_counter!(
                "container_monitor_sentinel_samples_total",
                "Samples recorded as unavailable (-1)"
            )
            .expect("Failed to register sentinel_samples"),

            store_errors: register_int_counter!(
                "container_monitor_store_errors_total",
                "Window store writes that failed"
            )
            .expect("Failed to register store_errors"),

            latency_probe_failures: register_int_counter!(
                "container_monitor_latency_probe_failures_total",
                "Latency probes that produced no measurement"
            )
            .expect("Failed to register latency_probe_failures"),

            notifications_published: register_int_counter!(
                "container_monitor_notifications_published_total",
                "Batch-ready signals successfully published"
            )
            .expect("Failed to register notifications_published"),

            degraded_targets: register_int_gauge!(
                "container_monitor_degraded_targets",
                "Targets whose metrics API failed in the last cycle"
            )
            .expect("Failed to register degraded_targets"),

            targets_monitored: register_int_gauge!(
                "container_monitor_targets",
                "Hosts being polled"
            )
            .expect("Failed to register targets_monitored"),

            containers_monitored: register_int_gauge!(
                "container_monitor_containers",
                "Containers being polled across all hosts"
            )
            .expect("Failed to register containers_monitored"),

            host_latency_ms: register_gauge_vec!(
                "container_monitor_host_latency_milliseconds",
                "Last measured mean round trip per host, -1 when unavailable",
                &["host"]
            )
            .expect("Failed to register host_latency_ms"),
        }
    }
}

/// Handle to the process-wide collector metrics.
///
/// Clones are free and share the same underlying collectors.
#[derive(Clone)]
pub struct MonitorMetrics {
    _private: (),
}

impl Default for MonitorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(MonitorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &MonitorMetricsInner {
        GLOBAL_METRICS.get_or_init(MonitorMetricsInner::new)
    }

    pub fn set_targets(&self, targets: usize, containers: usize) {
        self.inner().targets_monitored.set(targets as i64);
        self.inner().containers_monitored.set(containers as i64);
    }

    pub fn observe_latency(&self, host: &str, latency_ms: f64) {
        self.inner()
            .host_latency_ms
            .with_label_values(&[host])
            .set(latency_ms);
    }

    /// Fold one finished cycle into the counters
    pub fn record_cycle(&self, report: &CycleReport) {
        let inner = self.inner();
        inner
            .cycle_duration_seconds
            .observe(report.elapsed.as_secs_f64());
        inner.cycles_completed.inc();
        inner.samples_written.inc_by(report.samples_written as u64);
        inner.sentinel_samples.inc_by(report.sentinel_samples as u64);
        inner.store_errors.inc_by(report.store_errors as u64);
        inner
            .latency_probe_failures
            .inc_by(report.latency_failures as u64);
        inner.degraded_targets.set(report.degraded_targets as i64);
        if report.notified {
            inner.notifications_published.inc();
        }
    }
}

/// Event-tagged lifecycle logging
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn log_startup(&self, version: &str, targets: usize, window_size: usize, interval_secs: u64) {
        info!(
            event = "monitor_started",
            instance = %self.instance,
            version = %version,
            targets = targets,
            window_size = window_size,
            interval_secs = interval_secs,
            "Container monitor started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "monitor_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Container monitor shutting down"
        );
    }

    pub fn log_cycle(&self, cycle: u64, report: &CycleReport) {
        if report.degraded_targets > 0 || report.store_errors > 0 {
            warn!(
                event = "cycle_completed",
                instance = %self.instance,
                cycle = cycle,
                targets = report.targets,
                degraded_targets = report.degraded_targets,
                samples_written = report.samples_written,
                store_errors = report.store_errors,
                latency_failures = report.latency_failures,
                elapsed_ms = report.elapsed.as_millis() as u64,
                "Cycle completed with degraded targets"
            );
        } else {
            info!(
                event = "cycle_completed",
                instance = %self.instance,
                cycle = cycle,
                targets = report.targets,
                samples_written = report.samples_written,
                latency_failures = report.latency_failures,
                elapsed_ms = report.elapsed.as_millis() as u64,
                "Cycle completed"
            );
        }
    }

    pub fn log_target_degraded(&self, host: &str, containers: usize, error: &str) {
        warn!(
            event = "target_degraded",
            instance = %self.instance,
            host = %host,
            containers = containers,
            error = %error,
            "Metrics API unavailable, recording sentinel values"
        );
    }

    pub fn log_store_failure(&self, key: &str, error: &str) {
        warn!(
            event = "store_write_failed",
            instance = %self.instance,
            key = %key,
            error = %error,
            "Failed to append sample to window store"
        );
    }
}
