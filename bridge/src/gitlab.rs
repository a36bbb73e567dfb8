//! GitLab system hook validation and decoding.

use axum::http::HeaderMap;
use repo_directory::config::optional_env;
use repo_directory::{ConfigError, normalize};
use serde::Deserialize;
use std::fmt;
use thiserror::Error;

pub const EVENT_HEADER: &str = "X-Gitlab-Event";
pub const TOKEN_HEADER: &str = "X-Gitlab-Token";
pub const SYSTEM_HOOK_EVENT: &str = "System Hook";

#[derive(Debug, Error)]
pub enum HookError {
    #[error("no valid GitLab Hook Header found")]
    InvalidEvent,

    #[error("invalid GitLab token")]
    InvalidToken,

    #[error("invalid system hook payload: {0}")]
    InvalidPayload(#[from] serde_json::Error)
}

/// Shared secret and host aliases for incoming GitLab hooks.
#[derive(Clone, Default, PartialEq)]
pub struct GitLabSettings {
    pub token: String,
    /// Equivalent host names, canonical first.
    pub host_names: Vec<String>
}

impl fmt::Debug for GitLabSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitLabSettings")
            .field("token", &"<redacted>")
            .field("host_names", &self.host_names)
            .finish()
    }
}

impl GitLabSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let host_names: Option<String> = optional_env("GITLAB_HOST_NAMES")?;
        Ok(Self {
            token: optional_env("GITLAB_TOKEN")?.unwrap_or_default(),
            host_names: host_names.as_deref().map(parse_host_names).unwrap_or_default()
        })
    }
}

fn parse_host_names(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|host| !host.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Deserialize)]
struct SystemHook {
    #[serde(default)]
    event_name: String,
    #[serde(default)]
    project: HookProject
}

#[derive(Debug, Default, Deserialize)]
struct HookProject {
    #[serde(default)]
    web_url: String
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

/// Accepts only system hooks carrying the configured token.
pub fn validate_headers(headers: &HeaderMap, settings: &GitLabSettings) -> Result<(), HookError> {
    if header_value(headers, EVENT_HEADER) != SYSTEM_HOOK_EVENT {
        return Err(HookError::InvalidEvent);
    }
    if header_value(headers, TOKEN_HEADER) != settings.token {
        return Err(HookError::InvalidToken);
    }
    Ok(())
}

/// Returns the project's `web_url`, or `""` when the hook has none.
pub fn extract_project_url(body: &[u8]) -> Result<String, HookError> {
    let hook: SystemHook = serde_json::from_slice(body)?;
    tracing::debug!(event_name = %hook.event_name, "Decoded GitLab system hook");
    Ok(hook.project.web_url)
}

pub fn normalized_url_from_request(
    headers: &HeaderMap,
    body: &[u8],
    settings: &GitLabSettings
) -> Result<String, HookError> {
    validate_headers(headers, settings)?;
    let web_url = extract_project_url(body)?;
    Ok(normalize(&web_url, settings.host_names.as_slice()))
}
