pub mod cache;
pub mod config;
pub mod crucible;
pub mod error;
pub mod fetcher;
pub mod normalize;
pub mod scheduler;
pub mod telemetry;

#[cfg(test)]
mod test_support;

pub use cache::{DirectoryEntry, RefreshReport, RepositoryDirectory, Snapshot};
pub use config::CrucibleSettings;
pub use crucible::{CrucibleClient, IndexTrigger, RawRepository, RepositoryLister, RepositoryPage, create_crucible_client};
pub use error::{ConfigError, FetchError, FetchResult, RefreshError, RefreshResult, SchedulerError, TriggerError};
pub use fetcher::{FetchedDirectory, fetch_all};
pub use normalize::normalize;
pub use scheduler::RefreshScheduler;
