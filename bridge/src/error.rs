//! Error types for the GitLab → Crucible bridge.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response}
};
use repo_directory::{ConfigError, SchedulerError, TriggerError};
use serde::Serialize;
use thiserror::Error;

use crate::gitlab::HookError;

/// Result type alias for the bridge.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that can occur while serving webhooks or running the bridge.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The request is not a valid GitLab system hook.
    #[error(transparent)]
    Hook(#[from] HookError),

    /// The hook decoded but carried no project URL.
    #[error("git url is empty. Is the hook in the proper format?")]
    EmptyGitUrl,

    /// No Crucible repository is registered for the normalized URL.
    #[error("project not found")]
    ProjectNotFound { location: String },

    /// Crucible refused or never answered the re-index call.
    #[error(transparent)]
    Trigger(#[from] TriggerError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Refresh scheduler error.
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// Server startup error.
    #[error("Server error: {0}")]
    Server(String)
}

/// Error response body for HTTP endpoints.
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            Self::Hook(e) => {
                tracing::warn!(error = %e, "Rejected webhook");
                (StatusCode::BAD_REQUEST, "INVALID_HOOK")
            }
            Self::EmptyGitUrl => (StatusCode::BAD_REQUEST, "EMPTY_GIT_URL"),
            Self::ProjectNotFound { location } => {
                tracing::info!(location = %location, "No Crucible repository for project");
                (StatusCode::NOT_FOUND, "PROJECT_NOT_FOUND")
            }
            Self::Trigger(e) => {
                tracing::error!(error = %e, "Crucible trigger failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "TRIGGER_FAILED")
            }
            Self::Configuration(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIGURATION_ERROR"),
            Self::Scheduler(_) => (StatusCode::INTERNAL_SERVER_ERROR, "SCHEDULER_ERROR"),
            Self::Server(_) => (StatusCode::INTERNAL_SERVER_ERROR, "SERVER_ERROR")
        };

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string()
        };

        (status, Json(body)).into_response()
    }
}
