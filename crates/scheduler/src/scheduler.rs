use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

/// Named async jobs on six-field cron expressions (`sec min hour dom mon dow`).
pub struct CronScheduler {
    scheduler: JobScheduler,
    jobs: Vec<&'static str>,
}

impl CronScheduler {
    pub async fn new() -> Result<Self> {
        let scheduler = JobScheduler::new().await?;

        Ok(Self {
            scheduler,
            jobs: Vec::new(),
        })
    }

    pub async fn add_cron_job<F, Fut>(
        &mut self,
        name: &'static str,
        cron_expression: &str,
        job_fn: F,
    ) -> Result<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        info!("Scheduling job '{}' with cron: {}", name, cron_expression);

        let job_fn = Arc::new(job_fn);
        let job = Job::new_async(cron_expression, move |_uuid, _l| {
            let job_fn = job_fn.clone();
            Box::pin(async move {
                info!("Executing job '{}' at {}", name, OffsetDateTime::now_utc());
                match job_fn().await {
                    Ok(()) => info!("Job '{}' completed successfully", name),
                    Err(e) => error!("Job '{}' failed: {}", name, e),
                }
            })
        })?;

        self.scheduler.add(job).await?;
        self.jobs.push(name);
        Ok(())
    }

    /// Names of the registered jobs, in registration order.
    pub fn job_names(&self) -> &[&'static str] {
        &self.jobs
    }

    pub async fn start(&self) -> Result<()> {
        info!("Starting scheduler with {} jobs", self.jobs.len());
        self.scheduler.start().await?;
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        info!("Shutting down scheduler...");
        self.scheduler.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn registers_valid_expressions() {
        let mut scheduler = CronScheduler::new().await.unwrap();
        scheduler
            .add_cron_job("noop", "0 30 3 * * *", || async { Ok(()) })
            .await
            .unwrap();
        assert_eq!(scheduler.job_names(), ["noop"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rejects_invalid_expressions() {
        let mut scheduler = CronScheduler::new().await.unwrap();
        let result = scheduler
            .add_cron_job("broken", "every morning", || async { Ok(()) })
            .await;
        assert!(result.is_err());
        assert!(scheduler.job_names().is_empty());
    }
}
