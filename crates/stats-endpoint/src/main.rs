//! Stats endpoint - per-container metrics API for one host
//!
//! Runs next to the container runtime and derives the eight container
//! metrics on request for the collector to poll.

use anyhow::Result;
use clap::Parser;
use monitor_lib::stats::{ContainerInspector, StatsService};
use stats_endpoint::router;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Per-container metrics API
#[derive(Parser)]
#[command(name = "stats-endpoint")]
#[command(author, version, about = "Per-container metrics API for the container monitor", long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(long, env = "STATS_ENDPOINT_PORT", default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let args = Args::parse();

    let service = StatsService::new(connect_runtime()?);
    let app = router::create_router(service);

    let addr = format!("0.0.0.0:{}", args.port);
    info!(addr = %addr, "Starting stats endpoint");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for SIGINT");
            }
        })
        .await?;

    info!("Stats endpoint stopped");
    Ok(())
}

#[cfg(feature = "docker")]
fn connect_runtime() -> Result<Arc<dyn ContainerInspector>> {
    let inspector = monitor_lib::stats::DockerInspector::connect()?;
    info!("Connected to Docker Engine");
    Ok(Arc::new(inspector))
}

#[cfg(not(feature = "docker"))]
fn connect_runtime() -> Result<Arc<dyn ContainerInspector>> {
    anyhow::bail!("no container runtime available; rebuild with the `docker` feature")
}
