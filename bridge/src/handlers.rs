//! HTTP request handlers for the bridge.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse
};
use chrono::{DateTime, Utc};
use repo_directory::Snapshot;
use serde::Serialize;

use crate::error::{BridgeError, Result};
use crate::gitlab::normalized_url_from_request;
use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub populated: bool,
    pub entries: usize,
    pub generation: u64,
    pub last_refreshed_at: Option<DateTime<Utc>>
}

impl HealthResponse {
    fn from_snapshot(snapshot: Option<&Snapshot>) -> Self {
        match snapshot {
            Some(snapshot) => Self {
                status: "healthy".to_string(),
                populated: true,
                entries: snapshot.len(),
                generation: snapshot.generation(),
                last_refreshed_at: Some(snapshot.built_at())
            },
            None => Self {
                status: "not populated".to_string(),
                populated: false,
                entries: 0,
                generation: 0,
                last_refreshed_at: None
            }
        }
    }
}

/// GET /
///
/// Liveness check for load balancers.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// POST /
///
/// Resolves the hook's project URL to a Crucible repository and triggers an
/// incremental index of it.
pub async fn webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<StatusCode> {
    let location = normalized_url_from_request(&headers, &body, &state.gitlab)?;
    if location.is_empty() {
        return Err(BridgeError::EmptyGitUrl);
    }

    let project_id = state
        .directory
        .lookup(&location)
        .ok_or_else(|| BridgeError::ProjectNotFound {
            location: location.clone()
        })?;

    state.trigger.trigger_incremental_index(&project_id).await?;

    tracing::info!(
        location = %location,
        project_id = %project_id,
        "Triggered Crucible incremental index"
    );
    Ok(StatusCode::OK)
}

/// GET /health
///
/// Returns 412 until the first directory refresh has succeeded. Every field
/// comes from the same snapshot.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let response = HealthResponse::from_snapshot(state.directory.snapshot().as_deref());
    let status = if response.populated {
        StatusCode::OK
    } else {
        StatusCode::PRECONDITION_FAILED
    };

    (status, Json(response))
}

/// GET /metrics
///
/// Prometheus text exposition.
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = state
        .metrics
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default();

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body
    )
}
