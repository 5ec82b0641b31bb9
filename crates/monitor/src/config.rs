//! Monitor configuration

use anyhow::{Context, Result};
use monitor_lib::{MonitorError, MonitorTarget};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

const DEFAULT_ADMIN_PORT: u16 = 9100;
const DEFAULT_PROBE_PORT: u16 = 80;

/// Unparsed values as read from `MONITOR_*` environment variables
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSettings {
    pub endpoints: Option<String>,
    pub interval: Option<String>,
    pub window_size: Option<String>,
    pub admin_port: Option<String>,
    pub store_url: Option<String>,
    pub flush_on_start: Option<String>,
    pub probe_port: Option<String>,
}

/// Validated monitor configuration
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorSettings {
    /// Hosts to poll and the containers on each
    pub targets: Vec<MonitorTarget>,
    pub interval: Duration,
    /// Maximum samples kept per window key
    pub window_size: usize,
    /// Port for `/healthz`, `/readyz` and `/metrics`
    pub admin_port: u16,
    /// Backing store URL; `None` keeps windows in process
    pub store_url: Option<String>,
    pub flush_on_start: bool,
    pub probe_port: u16,
}

impl MonitorSettings {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let raw: RawSettings = config::Config::builder()
            .add_source(config::Environment::with_prefix("MONITOR"))
            .build()
            .and_then(|c| c.try_deserialize())
            .context("failed to read MONITOR_* environment")?;

        Ok(Self::from_raw(raw)?)
    }

    /// Validate raw values. Any missing or malformed required value is an error.
    pub fn from_raw(raw: RawSettings) -> Result<Self, MonitorError> {
        let endpoints = required(raw.endpoints, "MONITOR_ENDPOINTS")?;
        let targets = parse_endpoints(&endpoints)?;

        let interval = parse_positive(&required(raw.interval, "MONITOR_INTERVAL")?, "MONITOR_INTERVAL")?;
        let window_size = parse_positive(
            &required(raw.window_size, "MONITOR_WINDOW_SIZE")?,
            "MONITOR_WINDOW_SIZE",
        )?;

        let admin_port = match raw.admin_port {
            Some(port) => parse_port(&port, "MONITOR_ADMIN_PORT")?,
            None => DEFAULT_ADMIN_PORT,
        };
        let probe_port = match raw.probe_port {
            Some(port) => parse_port(&port, "MONITOR_PROBE_PORT")?,
            None => DEFAULT_PROBE_PORT,
        };
        let flush_on_start = match raw.flush_on_start {
            Some(flag) => parse_flag(&flag, "MONITOR_FLUSH_ON_START")?,
            None => true,
        };
        let store_url = raw.store_url.filter(|url| !url.trim().is_empty());

        Ok(Self {
            targets,
            interval: Duration::from_secs(interval),
            window_size: window_size as usize,
            admin_port,
            store_url,
            flush_on_start,
            probe_port,
        })
    }

    pub fn container_count(&self) -> usize {
        self.targets.iter().map(|t| t.containers.len()).sum()
    }
}

fn required(value: Option<String>, name: &str) -> Result<String, MonitorError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| MonitorError::Config(format!("{name} is required")))
}

/// Parse a JSON object mapping host to its container names
fn parse_endpoints(raw: &str) -> Result<Vec<MonitorTarget>, MonitorError> {
    let endpoints: BTreeMap<String, Vec<String>> = serde_json::from_str(raw).map_err(|e| {
        MonitorError::Config(format!("MONITOR_ENDPOINTS is not a host to container list map: {e}"))
    })?;

    if endpoints.is_empty() {
        return Err(MonitorError::Config(
            "MONITOR_ENDPOINTS names no hosts".to_string(),
        ));
    }

    Ok(endpoints
        .into_iter()
        .map(|(host, containers)| MonitorTarget::new(host, containers))
        .collect())
}

fn parse_positive(raw: &str, name: &str) -> Result<u64, MonitorError> {
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(MonitorError::Config(format!("{name} must be greater than zero"))),
        Ok(value) => Ok(value),
        Err(e) => Err(MonitorError::Config(format!("{name} is not a whole number: {e}"))),
    }
}

fn parse_port(raw: &str, name: &str) -> Result<u16, MonitorError> {
    raw.trim()
        .parse()
        .map_err(|e| MonitorError::Config(format!("{name} is not a valid port: {e}")))
}

fn parse_flag(raw: &str, name: &str) -> Result<bool, MonitorError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(MonitorError::Config(format!("{name} is not a boolean: {other}"))),
    }
}
