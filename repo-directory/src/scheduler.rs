use crate::cache::{RefreshReport, RepositoryDirectory};
use crate::error::{RefreshResult, SchedulerError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

/// Re-runs [`RepositoryDirectory::refresh`] on a fixed period.
pub struct RefreshScheduler {
    scheduler: JobScheduler,
    directory: Arc<RepositoryDirectory>,
    interval: Duration,
    last_report: Arc<RwLock<Option<RefreshReport>>>
}

impl RefreshScheduler {
    pub async fn new(directory: Arc<RepositoryDirectory>, interval: Duration) -> Result<Self, SchedulerError> {
        if interval.is_zero() {
            return Err(SchedulerError::InvalidInterval);
        }

        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| SchedulerError::Scheduler(e.to_string()))?;

        let last_report = Arc::new(RwLock::new(None));

        let directory_clone = directory.clone();
        let report_clone = last_report.clone();

        let job = Job::new_repeated_async(interval, move |_uuid, _lock| {
            let directory = directory_clone.clone();
            let report = report_clone.clone();
            Box::pin(async move {
                info!("Starting scheduled repository directory refresh");
                match directory.refresh().await {
                    Ok(refresh_report) => {
                        info!(
                            generation = refresh_report.generation,
                            entries = refresh_report.entries_installed,
                            "Scheduled refresh completed"
                        );
                        let mut guard = report.write().await;
                        *guard = Some(refresh_report);
                    }
                    Err(e) => {
                        error!(
                            error = %e,
                            retryable = e.is_retryable(),
                            "Scheduled refresh failed, retrying on next tick"
                        );
                    }
                }
            })
        })
        .map_err(|e| SchedulerError::Scheduler(e.to_string()))?;

        scheduler
            .add(job)
            .await
            .map_err(|e| SchedulerError::Scheduler(e.to_string()))?;

        Ok(Self {
            scheduler,
            directory,
            interval,
            last_report
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Performs the initial refresh before traffic is served. A failure is
    /// logged and the directory stays unpopulated until a later tick succeeds.
    pub async fn bootstrap(&self) -> Option<RefreshReport> {
        match self.run_now().await {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(
                    error = %e,
                    "Initial repository directory refresh failed, starting unpopulated"
                );
                None
            }
        }
    }

    pub async fn start(&self) -> Result<(), SchedulerError> {
        self.scheduler
            .start()
            .await
            .map_err(|e| SchedulerError::Scheduler(e.to_string()))?;
        info!(
            interval_secs = self.interval.as_secs(),
            "Repository directory refresh scheduler started"
        );
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<(), SchedulerError> {
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| SchedulerError::Scheduler(e.to_string()))?;
        info!("Repository directory refresh scheduler stopped");
        Ok(())
    }

    pub async fn run_now(&self) -> RefreshResult<RefreshReport> {
        let report = self.directory.refresh().await?;
        let mut guard = self.last_report.write().await;
        *guard = Some(report.clone());
        Ok(report)
    }

    pub async fn last_report(&self) -> Option<RefreshReport> {
        self.last_report.read().await.clone()
    }
}
