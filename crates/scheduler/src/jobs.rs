use std::sync::Arc;

use anyhow::Result;
use common::config::SchedulerConfig;
use common::Crawler;
use rewrite::SupabaseTaskProcessor;
use tophub::TopHubCrawler;
use tracing::info;

use crate::scheduler::CronScheduler;

pub const HOTLIST_JOB: &str = "hotlist-refresh";
pub const REWRITE_JOB: &str = "rewrite-batch";
pub const PURGE_JOB: &str = "rewrite-purge";

/// Registers the hot list refresh, rewrite batch and cleanup jobs.
pub async fn register_jobs(
    scheduler: &mut CronScheduler,
    config: &SchedulerConfig,
    crawler: Arc<TopHubCrawler>,
    processor: Arc<SupabaseTaskProcessor>,
) -> Result<()> {
    scheduler
        .add_cron_job(HOTLIST_JOB, &config.hotlist_cron, move || {
            let crawler = crawler.clone();
            async move {
                info!("Running {} crawler", crawler.name());
                crawler.run().await?;
                Ok(())
            }
        })
        .await?;

    let batch_processor = processor.clone();
    scheduler
        .add_cron_job(REWRITE_JOB, &config.rewrite_cron, move || {
            let processor = batch_processor.clone();
            async move {
                let report = processor.run_batch().await?;
                let failed = report.results.iter().filter(|r| !r.success).count();
                info!(
                    "Rewrite batch processed {} tasks ({} failed)",
                    report.processed, failed
                );
                Ok(())
            }
        })
        .await?;

    scheduler
        .add_cron_job(PURGE_JOB, &config.purge_cron, move || {
            let processor = processor.clone();
            async move {
                processor.purge_completed().await?;
                Ok(())
            }
        })
        .await?;

    Ok(())
}
