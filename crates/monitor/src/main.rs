//! Container monitor - per-container metrics collector
//!
//! Polls each configured host's metrics API and its network latency on a
//! fixed interval, keeps a bounded window per metric series, and signals
//! consumers after every completed cycle.

use anyhow::{Context, Result};
use container_monitor::{api, config::MonitorSettings};
use monitor_lib::{
    health::{components, HealthRegistry},
    observability::{MonitorMetrics, StructuredLogger},
    ChannelHub, HttpMetricsApi, LatencyProbe, ListBackend, MemoryBackend, Notifier, Poller,
    Publisher, TcpPinger, WindowedStore,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const MONITOR_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting container-monitor");

    // Malformed configuration exits before anything runs
    let settings = MonitorSettings::load()?;
    info!(
        targets = settings.targets.len(),
        containers = settings.container_count(),
        "Monitor configured"
    );

    let (backend, publisher) = connect_backends(&settings).await?;
    let store = WindowedStore::new(backend, settings.window_size)?;
    if settings.flush_on_start {
        store
            .flush()
            .await
            .context("failed to flush window store at startup")?;
        info!("Window store flushed");
    }

    // Initialize health registry
    let health_registry = HealthRegistry::new();
    health_registry.register(components::POLLER).await;
    health_registry.register(components::STORE).await;
    health_registry.register(components::NOTIFIER).await;

    let metrics = MonitorMetrics::new();
    let logger = StructuredLogger::new(format!("container-monitor:{}", settings.admin_port));
    logger.log_startup(
        MONITOR_VERSION,
        settings.targets.len(),
        settings.window_size,
        settings.interval.as_secs(),
    );

    let poller = Poller::builder()
        .targets(settings.targets.clone())
        .metrics_api(Arc::new(HttpMetricsApi::new(settings.interval)?))
        .store(store)
        .probe(LatencyProbe::new(Arc::new(TcpPinger::new(settings.probe_port))))
        .notifier(Notifier::new(publisher))
        .interval(settings.interval)
        .logger(logger.clone())
        .metrics(metrics.clone())
        .health(health_registry.clone())
        .build()?;

    let shutdown = CancellationToken::new();
    let signals = tokio::spawn(wait_for_signal(shutdown.clone()));

    // Start health and metrics server
    let app_state = Arc::new(api::AppState::new(health_registry.clone(), metrics));
    let api_handle = tokio::spawn(api::serve(settings.admin_port, app_state, shutdown.clone()));

    // Mark monitor as ready after initialization
    health_registry.set_ready(true).await;

    poller.run(shutdown.clone()).await;

    let reason = signals.await.unwrap_or("signal handler failed");
    logger.log_shutdown(reason);

    match api_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "Admin API exited with error"),
        Err(e) => warn!(error = %e, "Admin API task failed"),
    }

    info!("Shutdown complete");
    Ok(())
}

type Backends = (Arc<dyn ListBackend>, Arc<dyn Publisher>);

/// Choose the window and notification backends from the store URL
async fn connect_backends(settings: &MonitorSettings) -> Result<Backends> {
    match settings.store_url.as_deref() {
        Some(url) => connect_redis(url).await,
        None => {
            info!("Using in-process window store");
            let backend: Arc<dyn ListBackend> = Arc::new(MemoryBackend::new());
            let publisher: Arc<dyn Publisher> = Arc::new(ChannelHub::default());
            Ok((backend, publisher))
        }
    }
}

#[cfg(feature = "redis")]
async fn connect_redis(url: &str) -> Result<Backends> {
    let redis = Arc::new(
        monitor_lib::store::RedisBackend::connect(url)
            .await
            .with_context(|| format!("failed to connect to {url}"))?,
    );
    info!(url = %url, "Using Redis window store");

    let backend: Arc<dyn ListBackend> = redis.clone();
    let publisher: Arc<dyn Publisher> = redis;
    Ok((backend, publisher))
}

#[cfg(not(feature = "redis"))]
async fn connect_redis(url: &str) -> Result<Backends> {
    anyhow::bail!("MONITOR_STORE_URL={url} requires the `redis` feature")
}

/// Cancel `shutdown` on SIGINT or SIGTERM, returning which one arrived
async fn wait_for_signal(shutdown: CancellationToken) -> &'static str {
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let reason = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!(error = %e, "Failed to listen for SIGINT");
            }
            "SIGINT received"
        }
        _ = terminate => "SIGTERM received",
    };

    shutdown.cancel();
    reason
}
