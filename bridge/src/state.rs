//! Configuration and shared application state for the bridge.

use metrics_exporter_prometheus::PrometheusHandle;
use repo_directory::config::optional_env;
use repo_directory::{CrucibleSettings, IndexTrigger, RepositoryDirectory};
use std::sync::Arc;

use crate::error::{BridgeError, Result};
use crate::gitlab::GitLabSettings;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8888;

/// Configuration for the bridge server.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Host to bind the server to.
    pub host: String,
    /// Port to bind the server to.
    pub port: u16,
    pub crucible: CrucibleSettings,
    pub gitlab: GitLabSettings
}

impl BridgeConfig {
    /// Creates a new configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            host: optional_env("BRIDGE_HOST")?.unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: optional_env("BRIDGE_PORT")?.unwrap_or(DEFAULT_PORT),
            crucible: CrucibleSettings::from_env()?,
            gitlab: GitLabSettings::from_env()?
        })
    }

    /// Creates a builder for configuration.
    #[must_use]
    pub fn builder() -> BridgeConfigBuilder {
        BridgeConfigBuilder::default()
    }
}

/// Builder for `BridgeConfig`.
#[derive(Default)]
pub struct BridgeConfigBuilder {
    host: Option<String>,
    port: Option<u16>,
    crucible: Option<CrucibleSettings>,
    gitlab: Option<GitLabSettings>
}

impl BridgeConfigBuilder {
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    #[must_use]
    pub fn crucible(mut self, settings: CrucibleSettings) -> Self {
        self.crucible = Some(settings);
        self
    }

    #[must_use]
    pub fn gitlab(mut self, settings: GitLabSettings) -> Self {
        self.gitlab = Some(settings);
        self
    }

    pub fn build(self) -> Result<BridgeConfig> {
        let crucible = self
            .crucible
            .ok_or_else(|| BridgeError::Server("crucible settings are required".to_string()))?;

        Ok(BridgeConfig {
            host: self.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: self.port.unwrap_or(DEFAULT_PORT),
            crucible,
            gitlab: self.gitlab.unwrap_or_default()
        })
    }
}

/// Shared application state for Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub directory: Arc<RepositoryDirectory>,
    pub trigger: Arc<dyn IndexTrigger>,
    pub gitlab: Arc<GitLabSettings>,
    /// Absent when no Prometheus recorder is installed, e.g. in router tests.
    pub metrics: Option<PrometheusHandle>
}

impl AppState {
    pub fn new(
        directory: Arc<RepositoryDirectory>,
        trigger: Arc<dyn IndexTrigger>,
        gitlab: GitLabSettings
    ) -> Self {
        Self {
            directory,
            trigger,
            gitlab: Arc::new(gitlab),
            metrics: None
        }
    }

    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}
