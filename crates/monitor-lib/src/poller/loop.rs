//! Poll loop
//!
//! Drives fixed-period cycles until cancelled. Each cycle is one structured
//! task group: dropping it (on shutdown) aborts every scrape, probe and write
//! still in flight.

use super::tasks::{probe_target, scrape_target, LatencyOutcome, ScrapeOutcome};
use crate::health::HealthRegistry;
use crate::metrics_api::MetricsApi;
use crate::models::MonitorTarget;
use crate::notify::Notifier;
use crate::observability::{MonitorMetrics, StructuredLogger};
use crate::probe::LatencyProbe;
use crate::store::WindowedStore;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Configuration for the poll loop
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Target spacing between cycle starts (default: 10 seconds)
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
        }
    }
}

impl PollConfig {
    /// Delay before the next cycle: `max(0, interval - elapsed)`
    pub fn next_delay(&self, elapsed: Duration) -> Duration {
        self.interval.saturating_sub(elapsed)
    }
}

/// Aggregate outcome of one cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub targets: usize,
    /// Targets whose metrics API failed
    pub degraded_targets: usize,
    pub samples_written: usize,
    pub sentinel_samples: usize,
    pub store_errors: usize,
    pub latency_failures: usize,
    /// Tasks that panicked or were aborted before reporting
    pub aborted_tasks: usize,
    pub notified: bool,
    pub elapsed: Duration,
}

impl CycleReport {
    fn absorb_scrape(&mut self, outcome: ScrapeOutcome) {
        if outcome.degraded {
            self.degraded_targets += 1;
        }
        self.samples_written += outcome.samples_written;
        self.sentinel_samples += outcome.sentinel_samples;
        self.store_errors += outcome.store_errors;
    }

    fn absorb_latency(&mut self, outcome: LatencyOutcome, metrics: Option<&MonitorMetrics>) {
        let Some(latency_ms) = outcome.latency_ms else {
            return;
        };
        if let Some(metrics) = metrics {
            metrics.observe_latency(&outcome.host, latency_ms);
        }
        if latency_ms < 0.0 {
            self.latency_failures += 1;
        }
        if outcome.store_error {
            self.store_errors += 1;
        } else {
            self.samples_written += 1;
            if latency_ms < 0.0 {
                self.sentinel_samples += 1;
            }
        }
    }
}

enum TaskOutcome {
    Scrape(ScrapeOutcome),
    Latency(LatencyOutcome),
}

/// Periodically collects every target into the window store
pub struct Poller {
    targets: Arc<Vec<MonitorTarget>>,
    api: Arc<dyn MetricsApi>,
    store: WindowedStore,
    probe: LatencyProbe,
    notifier: Notifier,
    config: PollConfig,
    logger: StructuredLogger,
    metrics: Option<MonitorMetrics>,
    health: Option<HealthRegistry>,
}

impl Poller {
    pub fn builder() -> PollerBuilder {
        PollerBuilder::new()
    }

    pub fn targets(&self) -> &[MonitorTarget] {
        &self.targets
    }

    /// Run cycles until `shutdown` is cancelled.
    ///
    /// Cancellation during a cycle aborts its in-flight tasks and skips the
    /// notification; cancellation during the inter-cycle sleep returns at once.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            targets = self.targets.len(),
            "Starting poll loop"
        );

        let mut cycle = 0u64;
        loop {
            let start = Instant::now();

            let report = tokio::select! {
                report = self.run_cycle(&shutdown) => report,
                _ = shutdown.cancelled() => break,
            };
            cycle += 1;
            self.finish_cycle(cycle, &report).await;

            let delay = self.config.next_delay(start.elapsed());
            if delay.is_zero() {
                warn!(
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    interval_ms = self.config.interval.as_millis() as u64,
                    "Cycle overran the poll interval"
                );
            }

            tokio::select! {
                _ = sleep(delay) => {}
                _ = shutdown.cancelled() => break,
            }
        }

        info!(cycles = cycle, "Poll loop stopped");
    }

    /// Execute one cycle: fan out, join everything, then notify
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> CycleReport {
        let start = Instant::now();
        let mut tasks = JoinSet::new();

        for target in self.targets.iter() {
            tasks.spawn({
                let scrape = scrape_target(
                    self.api.clone(),
                    self.store.clone(),
                    target.clone(),
                    self.logger.clone(),
                    cancel.child_token(),
                );
                async move { TaskOutcome::Scrape(scrape.await) }
            });
            tasks.spawn({
                let latency = probe_target(
                    self.probe.clone(),
                    self.store.clone(),
                    target.host.clone(),
                    self.logger.clone(),
                    cancel.child_token(),
                );
                async move { TaskOutcome::Latency(latency.await) }
            });
        }

        let mut report = CycleReport {
            targets: self.targets.len(),
            ..Default::default()
        };

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(TaskOutcome::Scrape(outcome)) => report.absorb_scrape(outcome),
                Ok(TaskOutcome::Latency(outcome)) => {
                    report.absorb_latency(outcome, self.metrics.as_ref())
                }
                Err(e) => {
                    report.aborted_tasks += 1;
                    warn!(error = %e, "Cycle task aborted");
                }
            }
        }

        if cancel.is_cancelled() {
            debug!("Cycle cancelled, skipping batch-ready signal");
        } else {
            report.notified = self.notifier.publish().await;
        }

        report.elapsed = start.elapsed();
        report
    }

    async fn finish_cycle(&self, cycle: u64, report: &CycleReport) {
        self.logger.log_cycle(cycle, report);
        if let Some(metrics) = &self.metrics {
            metrics.record_cycle(report);
        }
        if let Some(health) = &self.health {
            health.record_cycle(report).await;
        }
    }
}

/// Builder for creating the poll loop
pub struct PollerBuilder {
    targets: Vec<MonitorTarget>,
    api: Option<Arc<dyn MetricsApi>>,
    store: Option<WindowedStore>,
    probe: Option<LatencyProbe>,
    notifier: Option<Notifier>,
    config: PollConfig,
    logger: Option<StructuredLogger>,
    metrics: Option<MonitorMetrics>,
    health: Option<HealthRegistry>,
}

impl PollerBuilder {
    pub fn new() -> Self {
        Self {
            targets: Vec::new(),
            api: None,
            store: None,
            probe: None,
            notifier: None,
            config: PollConfig::default(),
            logger: None,
            metrics: None,
            health: None,
        }
    }

    pub fn targets(mut self, targets: Vec<MonitorTarget>) -> Self {
        self.targets = targets;
        self
    }

    pub fn metrics_api(mut self, api: Arc<dyn MetricsApi>) -> Self {
        self.api = Some(api);
        self
    }

    pub fn store(mut self, store: WindowedStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn probe(mut self, probe: LatencyProbe) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    pub fn logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn metrics(mut self, metrics: MonitorMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn build(self) -> Result<Poller> {
        let api = self
            .api
            .ok_or_else(|| anyhow::anyhow!("Metrics API is required"))?;
        let store = self
            .store
            .ok_or_else(|| anyhow::anyhow!("Window store is required"))?;
        let probe = self
            .probe
            .ok_or_else(|| anyhow::anyhow!("Latency probe is required"))?;
        let notifier = self
            .notifier
            .ok_or_else(|| anyhow::anyhow!("Notifier is required"))?;
        if self.config.interval.is_zero() {
            anyhow::bail!("Poll interval must be greater than zero");
        }

        if let Some(metrics) = &self.metrics {
            let containers = self.targets.iter().map(|t| t.containers.len()).sum();
            metrics.set_targets(self.targets.len(), containers);
        }

        Ok(Poller {
            targets: Arc::new(self.targets),
            api,
            store,
            probe,
            notifier,
            config: self.config,
            logger: self
                .logger
                .unwrap_or_else(|| StructuredLogger::new("container-monitor")),
            metrics: self.metrics,
            health: self.health,
        })
    }
}

impl Default for PollerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
