//! Network latency probing
//!
//! A probe sends a fixed number of echo requests to a host, each bounded by
//! its own timeout, and reduces the replies to one mean round-trip time in
//! milliseconds. The default [`TcpPinger`] times TCP handshakes, which needs no
//! raw-socket privileges.

use crate::error::MonitorError;
use crate::models::SENTINEL;
use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{timeout, Instant};
use tracing::{debug, warn};

/// Echo requests sent per probe
pub const PROBE_COUNT: usize = 5;

/// Upper bound on each echo round trip
pub const PROBE_TIMEOUT: Duration = Duration::from_millis(100);

/// Transport used to send echo requests
#[async_trait]
pub trait Pinger: Send + Sync {
    /// Resolve and prepare the destination; failing here fails the whole probe
    async fn prepare(&self, host: &str) -> Result<SocketAddr, MonitorError>;

    /// Send one echo request and return its round-trip time
    async fn echo(&self, addr: SocketAddr) -> Result<Duration, MonitorError>;
}

/// Measures round trips as the time until the host answers a TCP connect.
///
/// Both a completed handshake and a refusal (RST) count as a reply. The port
/// comes from a `host:port` target, else the fallback given at construction.
#[derive(Debug, Clone)]
pub struct TcpPinger {
    port: u16,
}

impl TcpPinger {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    /// Split `host[:port]` into a host name and the port to connect to
    pub fn destination<'a>(&self, host: &'a str) -> Result<(&'a str, u16), MonitorError> {
        match host.split_once(':') {
            Some((name, port)) => {
                let port = port
                    .parse()
                    .map_err(|e| MonitorError::probe(host, format!("invalid port: {e}")))?;
                Ok((name, port))
            }
            None => Ok((host, self.port)),
        }
    }
}

#[async_trait]
impl Pinger for TcpPinger {
    async fn prepare(&self, host: &str) -> Result<SocketAddr, MonitorError> {
        let destination = self.destination(host)?;
        tokio::net::lookup_host(destination)
            .await
            .map_err(|e| MonitorError::probe(host, e))?
            .next()
            .ok_or_else(|| MonitorError::probe(host, "no address resolved"))
    }

    async fn echo(&self, addr: SocketAddr) -> Result<Duration, MonitorError> {
        let start = Instant::now();
        match TcpStream::connect(addr).await {
            Ok(_) => Ok(start.elapsed()),
            // The host's stack answered with a reset, which is still a round trip
            Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => Ok(start.elapsed()),
            Err(e) => Err(MonitorError::probe(addr.to_string(), e)),
        }
    }
}

/// Reduces a burst of echo requests to one latency sample
#[derive(Clone)]
pub struct LatencyProbe {
    pinger: Arc<dyn Pinger>,
    count: usize,
    timeout: Duration,
}

impl LatencyProbe {
    pub fn new(pinger: Arc<dyn Pinger>) -> Self {
        Self {
            pinger,
            count: PROBE_COUNT,
            timeout: PROBE_TIMEOUT,
        }
    }

    pub fn with_limits(pinger: Arc<dyn Pinger>, count: usize, timeout: Duration) -> Self {
        Self {
            pinger,
            count: count.max(1),
            timeout,
        }
    }

    /// Mean round trip to `host` in milliseconds across answered requests.
    ///
    /// Returns an error if the probe could not be set up or no request was
    /// answered within its timeout.
    pub async fn probe(&self, host: &str) -> Result<f64, MonitorError> {
        let addr = self.pinger.prepare(host).await?;

        let mut total = Duration::ZERO;
        let mut answered = 0u32;
        for _ in 0..self.count {
            match timeout(self.timeout, self.pinger.echo(addr)).await {
                Ok(Ok(rtt)) => {
                    total += rtt;
                    answered += 1;
                }
                Ok(Err(e)) => debug!(host = %host, error = %e, "Echo request failed"),
                Err(_) => debug!(host = %host, "Echo request timed out"),
            }
        }

        if answered == 0 {
            return Err(MonitorError::probe(host, "no echo replies received"));
        }

        Ok((total / answered).as_secs_f64() * 1000.0)
    }

    /// Like [`probe`](Self::probe) but degrades every failure to the sentinel
    pub async fn measure(&self, host: &str) -> f64 {
        match self.probe(host).await {
            Ok(latency_ms) => latency_ms,
            Err(e) => {
                warn!(host = %host, error = %e, "Latency probe failed");
                SENTINEL
            }
        }
    }
}
