use crate::config::CrucibleSettings;
use crate::error::{ConfigError, FetchError, FetchResult, TriggerError};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// One page of the repository listing seam.
#[async_trait]
pub trait RepositoryLister: Send + Sync {
    /// Fetches the page starting at `start` with at most `limit` entries.
    async fn list_page(&self, start: u32, limit: u32) -> FetchResult<RepositoryPage>;

    /// URL of the listing page at `start`, used in error and log context.
    fn page_url(&self, start: u32, limit: u32) -> String;
}

/// Instructs the review platform to re-index one project.
#[async_trait]
pub trait IndexTrigger: Send + Sync {
    async fn trigger_incremental_index(&self, project_id: &str) -> Result<(), TriggerError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryPage {
    #[serde(default)]
    pub start: u32,
    #[serde(default)]
    pub size: u32,
    #[serde(default)]
    pub last_page: bool,
    #[serde(default)]
    pub values: Vec<RawRepository>
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRepository {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<GitInformation>
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitInformation {
    #[serde(default)]
    pub location: String
}

impl RawRepository {
    pub fn git_location(&self) -> Option<&str> {
        self.git
            .as_ref()
            .map(|git| git.location.as_str())
            .filter(|location| !location.is_empty())
    }
}

/// reqwest-backed client for the Crucible admin REST API.
pub struct CrucibleClient {
    client: Client,
    settings: CrucibleSettings
}

impl CrucibleClient {
    pub fn new(settings: CrucibleSettings) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(settings.request_timeout())
            .build()?;

        Ok(Self { client, settings })
    }

    pub fn settings(&self) -> &CrucibleSettings {
        &self.settings
    }

    fn trigger_url(&self, project_id: &str) -> String {
        format!(
            "{}/admin/repositories/{}/incremental-index",
            self.settings.base_url(),
            urlencoding::encode(project_id)
        )
    }
}

#[async_trait]
impl RepositoryLister for CrucibleClient {
    async fn list_page(&self, start: u32, limit: u32) -> FetchResult<RepositoryPage> {
        let url = self.page_url(start, limit);
        debug!(url = %url, "Requesting Crucible repository page");

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.settings.username, Some(&self.settings.password))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.clone(),
                source
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status { url, status, body });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.clone(),
                source
            })?;

        serde_json::from_slice(&bytes).map_err(|source| FetchError::Decode { url, source })
    }

    fn page_url(&self, start: u32, limit: u32) -> String {
        format!(
            "{}/admin/repositories/?start={}&limit={}",
            self.settings.base_url(),
            start,
            limit
        )
    }
}

#[async_trait]
impl IndexTrigger for CrucibleClient {
    async fn trigger_incremental_index(&self, project_id: &str) -> Result<(), TriggerError> {
        let url = self.trigger_url(project_id);
        debug!(url = %url, project_id = %project_id, "Triggering Crucible incremental index");

        let response = self
            .client
            .put(&url)
            .header(CONTENT_TYPE, "application/json")
            .header("X-Api-Key", &self.settings.api_key)
            .send()
            .await
            .map_err(|source| TriggerError::Transport {
                url: url.clone(),
                source
            })?;

        let status = response.status();
        if status.as_u16() > 299 {
            return Err(TriggerError::Rejected { url, status });
        }

        Ok(())
    }
}

pub fn create_crucible_client(settings: CrucibleSettings) -> Result<Arc<CrucibleClient>, ConfigError> {
    Ok(Arc::new(CrucibleClient::new(settings)?))
}
