//! Client side of the per-host metrics API
//!
//! Each monitored host runs a stats endpoint answering
//! `GET /metrics?container_names=a&container_names=b` with a JSON object of
//! container name to its eight derived metrics.

use crate::error::{DecodeError, MonitorError};
use crate::models::MetricsReport;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Query parameter carrying each requested container name
pub const CONTAINER_PARAM: &str = "container_names";

/// Source of per-container metrics for one host
#[async_trait]
pub trait MetricsApi: Send + Sync {
    async fn fetch(&self, host: &str, containers: &[String]) -> Result<MetricsReport, MonitorError>;
}

/// Metrics API client over plain HTTP
#[derive(Debug, Clone)]
pub struct HttpMetricsApi {
    client: Client,
}

impl HttpMetricsApi {
    pub fn new(request_timeout: Duration) -> Result<Self, MonitorError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| MonitorError::Config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Build `http://{host}/metrics?container_names=...` preserving container order
    pub fn metrics_url(host: &str, containers: &[String]) -> Result<Url, MonitorError> {
        let mut url = Url::parse(&format!("http://{}/metrics", host))
            .map_err(|e| MonitorError::transport(host, format!("invalid host: {e}")))?;
        {
            let mut query = url.query_pairs_mut();
            for name in containers {
                query.append_pair(CONTAINER_PARAM, name);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl MetricsApi for HttpMetricsApi {
    async fn fetch(&self, host: &str, containers: &[String]) -> Result<MetricsReport, MonitorError> {
        let url = Self::metrics_url(host, containers)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MonitorError::transport(host, e))?;

        if !response.status().is_success() {
            return Err(MonitorError::transport(
                host,
                format!("metrics API returned {}", response.status()),
            ));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| MonitorError::transport(host, e))?;

        serde_json::from_slice(&body).map_err(|e| MonitorError::from(DecodeError::Malformed(e)))
    }
}
