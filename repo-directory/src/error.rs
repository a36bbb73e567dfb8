use reqwest::StatusCode;
use thiserror::Error;

pub type FetchResult<T> = Result<T, FetchError>;
pub type RefreshResult<T> = Result<T, RefreshError>;

/// Failure while fetching one page of the Crucible repository listing.
///
/// Every variant carries the URL that was attempted so the caller can log it
/// and decide whether the next scheduled cycle is worth waiting for.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error
    },

    #[error("Crucible API error at {url}: {status} - {body}")]
    Status {
        url: String,
        status: StatusCode,
        body: String
    },

    #[error("Malformed repository page from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error
    },

    #[error("Pagination stalled at {url}: offset {start} did not advance")]
    StalledPagination { url: String, start: u32 }
}

impl FetchError {
    pub fn url(&self) -> &str {
        match self {
            Self::Transport { url, .. }
            | Self::Status { url, .. }
            | Self::Decode { url, .. }
            | Self::StalledPagination { url, .. } => url
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport { source, .. } if source.is_timeout())
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            Self::Decode { .. } | Self::StalledPagination { .. } => false
        }
    }
}

/// Failure of one refresh cycle. The previously installed snapshot stays
/// authoritative.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("Directory fetch failed: {0}")]
    Fetch(#[from] FetchError)
}

impl RefreshError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_retryable()
        }
    }
}

/// Failure of the outbound re-index trigger call.
#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("Trigger request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error
    },

    #[error("Triggering Crucible failed: {status}")]
    Rejected { url: String, status: StatusCode }
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Refresh interval must be greater than zero")]
    InvalidInterval,

    #[error("Scheduler error: {0}")]
    Scheduler(String)
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {var}")]
    Missing { var: String },

    #[error("Invalid value for {var}: '{value}'")]
    Invalid { var: String, value: String },

    #[error("Invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("HTTP client setup failed: {0}")]
    Client(#[from] reqwest::Error)
}
