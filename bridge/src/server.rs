//! Server setup and lifecycle for the bridge.

use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use repo_directory::{RefreshScheduler, RepositoryDirectory, create_crucible_client};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;

use crate::error::{BridgeError, Result};
use crate::routes::{REQUEST_DURATION_BUCKETS, REQUEST_DURATION_METRIC, create_router};
use crate::state::{AppState, BridgeConfig};

/// The GitLab → Crucible bridge server.
pub struct BridgeServer {
    config: BridgeConfig,
    state: AppState,
    scheduler: RefreshScheduler
}

impl BridgeServer {
    /// Wires the Crucible client, repository directory and refresh scheduler.
    pub async fn new(config: BridgeConfig, metrics: Option<PrometheusHandle>) -> Result<Self> {
        let client = create_crucible_client(config.crucible.clone())?;
        let directory = Arc::new(RepositoryDirectory::new(
            client.clone(),
            config.crucible.project_limit,
            config.gitlab.host_names.clone()
        ));
        let scheduler = RefreshScheduler::new(directory.clone(), config.crucible.refresh_interval()).await?;

        let mut state = AppState::new(directory, client, config.gitlab.clone());
        if let Some(handle) = metrics {
            state = state.with_metrics(handle);
        }

        Ok(Self {
            config,
            state,
            scheduler
        })
    }

    /// Runs the initial refresh, starts the scheduler and serves HTTP until a
    /// shutdown signal arrives.
    pub async fn run(mut self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .map_err(|e| BridgeError::Server(format!("Invalid address: {e}")))?;

        self.scheduler.bootstrap().await;
        self.scheduler.start().await?;

        let router = create_router(self.state.clone());

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| BridgeError::Server(format!("Failed to bind to {addr}: {e}")))?;

        tracing::info!(
            %addr,
            crucible = %self.config.crucible.base_url(),
            refresh_minutes = self.config.crucible.project_refresh_interval_minutes,
            "GitLab Crucible bridge starting"
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| BridgeError::Server(format!("Server error: {e}")))?;

        self.scheduler.stop().await?;

        tracing::info!("GitLab Crucible bridge stopped");
        Ok(())
    }

    /// Returns a reference to the application state.
    #[must_use]
    pub fn state(&self) -> &AppState {
        &self.state
    }
}

/// Signal handler for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        () = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        },
    }
}

/// Installs the global Prometheus recorder with the request histogram buckets.
pub fn install_metrics_recorder() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(REQUEST_DURATION_METRIC.to_string()),
            &REQUEST_DURATION_BUCKETS
        )
        .and_then(PrometheusBuilder::install_recorder)
        .map_err(|e| BridgeError::Server(format!("Failed to install metrics recorder: {e}")))
}

/// Entry point for running the server from configuration.
pub async fn run_server(config: BridgeConfig) -> Result<()> {
    let metrics = install_metrics_recorder()?;
    let server = BridgeServer::new(config, Some(metrics)).await?;
    server.run().await
}

/// Entry point for running the server from environment variables.
///
/// This is a convenience function for containerized deployments.
pub async fn run_from_env() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into())
        )
        .init();

    let config = BridgeConfig::from_env()?;
    tracing::debug!(?config, "Loaded bridge configuration");
    run_server(config).await
}
