use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use validator::Validate;

pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 5;

/// Connection and paging settings for the Crucible REST API.
///
/// ## Environment Variables
/// - `CRUCIBLE_API_BASE_URL`: REST base URL (required)
/// - `CRUCIBLE_API_KEY`: key sent as `X-Api-Key` on trigger calls
/// - `CRUCIBLE_USERNAME` / `CRUCIBLE_PASSWORD`: basic auth for the listing
/// - `CRUCIBLE_PROJECT_REFRESH_INTERVAL`: refresh period in minutes (required)
/// - `CRUCIBLE_PROJECT_LIMIT`: repositories per page (required)
/// - `CRUCIBLE_REQUEST_TIMEOUT_SECONDS`: per-request timeout (default: 5)
#[derive(Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct CrucibleSettings {
    #[validate(url)]
    pub api_base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[validate(range(min = 1))]
    pub project_refresh_interval_minutes: u64,
    #[validate(range(min = 1))]
    pub project_limit: u32,
    #[serde(default = "default_request_timeout_seconds")]
    #[validate(range(min = 1))]
    pub request_timeout_seconds: u64
}

fn default_request_timeout_seconds() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECONDS
}

impl fmt::Debug for CrucibleSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrucibleSettings")
            .field("api_base_url", &self.api_base_url)
            .field("api_key", &"<redacted>")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field(
                "project_refresh_interval_minutes",
                &self.project_refresh_interval_minutes
            )
            .field("project_limit", &self.project_limit)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .finish()
    }
}

impl CrucibleSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let settings = Self {
            api_base_url: required_env("CRUCIBLE_API_BASE_URL")?,
            api_key: optional_env("CRUCIBLE_API_KEY")?.unwrap_or_default(),
            username: optional_env("CRUCIBLE_USERNAME")?.unwrap_or_default(),
            password: optional_env("CRUCIBLE_PASSWORD")?.unwrap_or_default(),
            project_refresh_interval_minutes: required_env("CRUCIBLE_PROJECT_REFRESH_INTERVAL")?,
            project_limit: required_env("CRUCIBLE_PROJECT_LIMIT")?,
            request_timeout_seconds: optional_env("CRUCIBLE_REQUEST_TIMEOUT_SECONDS")?
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECONDS)
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Base URL without trailing slashes, ready for path concatenation.
    pub fn base_url(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }

    /// Refresh period; saturates instead of overflowing for huge minute counts.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.project_refresh_interval_minutes.saturating_mul(60))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// Reads and parses a variable that must be present.
pub fn required_env<T: FromStr>(var: &str) -> Result<T, ConfigError> {
    optional_env(var)?.ok_or_else(|| ConfigError::Missing {
        var: var.to_string()
    })
}

/// Reads and parses a variable; unset and empty both mean `None`.
pub fn optional_env<T: FromStr>(var: &str) -> Result<Option<T>, ConfigError> {
    match env::var(var) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid {
                var: var.to_string(),
                value
            }),
        Err(_) => Ok(None)
    }
}
