//! Container runtime access
//!
//! The [`ContainerInspector`] seam hides the runtime client. With the `docker`
//! feature, [`DockerInspector`] talks to the local Docker Engine via bollard.

use super::extractor::RunState;
use super::schema::StatsDocument;
use crate::error::MonitorError;
use async_trait::async_trait;

/// Read-only view of a container runtime
#[async_trait]
pub trait ContainerInspector: Send + Sync {
    /// Look up a container by name or id
    async fn state(&self, container: &str) -> Result<RunState, MonitorError>;

    /// Take one stats snapshot of a running container
    async fn stats(&self, container: &str) -> Result<StatsDocument, MonitorError>;
}

#[cfg(feature = "docker")]
pub use docker::DockerInspector;

#[cfg(feature = "docker")]
mod docker {
    use super::*;
    use bollard::container::{InspectContainerOptions, StatsOptions};
    use bollard::errors::Error as BollardError;
    use bollard::Docker;
    use tokio_stream::StreamExt;

    const ENDPOINT: &str = "docker";

    /// Inspector backed by the local Docker Engine
    #[derive(Clone)]
    pub struct DockerInspector {
        docker: Docker,
    }

    impl DockerInspector {
        /// Connect using `DOCKER_HOST` or the platform default socket
        pub fn connect() -> Result<Self, MonitorError> {
            let docker = Docker::connect_with_local_defaults()
                .map_err(|e| MonitorError::transport(ENDPOINT, e))?;
            Ok(Self { docker })
        }

        pub fn with_client(docker: Docker) -> Self {
            Self { docker }
        }
    }

    #[async_trait]
    impl ContainerInspector for DockerInspector {
        async fn state(&self, container: &str) -> Result<RunState, MonitorError> {
            let response = match self
                .docker
                .inspect_container(container, None::<InspectContainerOptions>)
                .await
            {
                Ok(response) => response,
                Err(BollardError::DockerResponseServerError {
                    status_code: 404, ..
                }) => return Ok(RunState::Missing),
                Err(e) => return Err(MonitorError::transport(ENDPOINT, e)),
            };

            let state = response.state.unwrap_or_default();
            if state.running.unwrap_or(false) {
                Ok(RunState::Running)
            } else {
                let status = state
                    .status
                    .map(|s| format!("{:?}", s).to_lowercase())
                    .unwrap_or_else(|| "unknown".to_string());
                Ok(RunState::Stopped(status))
            }
        }

        async fn stats(&self, container: &str) -> Result<StatsDocument, MonitorError> {
            let options = StatsOptions {
                stream: false,
                one_shot: false,
            };
            let mut stream = Box::pin(self.docker.stats(container, Some(options)));

            let stats = stream
                .next()
                .await
                .ok_or_else(|| MonitorError::transport(ENDPOINT, "empty stats stream"))?
                .map_err(|e| MonitorError::transport(ENDPOINT, e))?;

            // Round-trip through JSON so the typed schema owns shape validation
            let value = serde_json::to_value(&stats).map_err(crate::error::DecodeError::from)?;
            Ok(StatsDocument::from_value(value)?)
        }
    }
}
