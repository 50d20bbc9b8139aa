//! Cron scheduler for periodic maintenance tasks.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job as CronJob, JobScheduler};

use chathub_auth::SessionManager;
use chathub_core::config::SessionConfig;
use chathub_core::error::AppError;

use crate::jobs::{ScheduledJob, SessionSweepJob};

/// Cron-based scheduler for periodic background tasks
pub struct CronScheduler {
    /// The underlying job scheduler
    scheduler: JobScheduler,
    /// Names of registered jobs, in registration order
    registered: Mutex<Vec<String>>,
}

impl std::fmt::Debug for CronScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CronScheduler").finish()
    }
}

impl CronScheduler {
    /// Create a new cron scheduler
    pub async fn new() -> Result<Self, AppError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {}", e)))?;

        Ok(Self {
            scheduler,
            registered: Mutex::new(Vec::new()),
        })
    }

    /// Register the built-in maintenance jobs
    pub async fn register_default_tasks(
        &self,
        sessions: Arc<SessionManager>,
        session_config: &SessionConfig,
    ) -> Result<(), AppError> {
        self.register(Arc::new(SessionSweepJob::new(sessions, session_config)))
            .await?;

        tracing::info!("All scheduled tasks registered");
        Ok(())
    }

    /// Register a job on its own cron expression.
    ///
    /// A tick that fails is logged; the job stays scheduled.
    pub async fn register(&self, job: Arc<dyn ScheduledJob>) -> Result<(), AppError> {
        let name = job.name().to_string();
        let schedule = job.schedule().to_string();

        let task = Arc::clone(&job);
        let cron = CronJob::new_async(schedule.as_str(), move |_uuid, _lock| {
            let task = Arc::clone(&task);
            Box::pin(async move {
                tracing::debug!(job = task.name(), "Running scheduled job");
                if let Err(e) = task.run().await {
                    tracing::error!(job = task.name(), error = %e, "Scheduled job failed");
                }
            })
        })
        .map_err(|e| {
            AppError::configuration(format!(
                "Invalid schedule '{}' for {}: {}",
                schedule, name, e
            ))
        })?;

        self.scheduler
            .add(cron)
            .await
            .map_err(|e| AppError::internal(format!("Failed to add {} schedule: {}", name, e)))?;

        tracing::info!(job = %name, schedule = %schedule, "Registered scheduled job");
        self.registered.lock().await.push(name);
        Ok(())
    }

    /// Names of the jobs registered so far
    pub async fn registered(&self) -> Vec<String> {
        self.registered.lock().await.clone()
    }

    /// Start the scheduler
    pub async fn start(&self) -> Result<(), AppError> {
        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {}", e)))?;

        tracing::info!("Cron scheduler started");
        Ok(())
    }

    /// Shutdown the scheduler
    pub async fn shutdown(&self) -> Result<(), AppError> {
        let mut scheduler = self.scheduler.clone();
        scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::internal(format!("Failed to shutdown scheduler: {}", e)))?;

        tracing::info!("Cron scheduler shut down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use chathub_core::error::ErrorKind;
    use chathub_core::result::AppResult;

    #[derive(Debug)]
    struct Noop(&'static str);

    #[async_trait]
    impl ScheduledJob for Noop {
        fn name(&self) -> &str {
            "noop"
        }

        fn schedule(&self) -> &str {
            self.0
        }

        async fn run(&self) -> AppResult<usize> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_register_tracks_job_names() {
        let scheduler = CronScheduler::new().await.unwrap();
        scheduler.register(Arc::new(Noop("0 * * * * *"))).await.unwrap();
        assert_eq!(scheduler.registered().await, vec!["noop".to_string()]);
    }

    #[tokio::test]
    async fn test_invalid_cron_is_configuration_error() {
        let scheduler = CronScheduler::new().await.unwrap();
        let err = scheduler
            .register(Arc::new(Noop("every now and then")))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);
        assert!(scheduler.registered().await.is_empty());
    }
}
