use std::sync::Arc;

use anyhow::Result;
use common::{Config, SupabaseClient};
use openrouter::OpenRouterClient;
use rewrite::{SupabaseTaskStore, TaskProcessor};
use scheduler::{register_jobs, CronScheduler};
use tophub::TopHubCrawler;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    let _ = dotenv::dotenv();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Config::from_env()?;
    let supabase = SupabaseClient::from_config(&config.supabase);

    let crawler = Arc::new(TopHubCrawler::new(&config, supabase.clone()));
    let processor = Arc::new(TaskProcessor::new(
        SupabaseTaskStore::new(supabase),
        OpenRouterClient::new(&config.openrouter)?,
        &config.rewrite,
    ));

    let mut scheduler = CronScheduler::new().await?;
    register_jobs(&mut scheduler, &config.scheduler, crawler, processor).await?;
    scheduler.start().await?;

    info!("Scheduler running jobs: {}", scheduler.job_names().join(", "));
    info!("Press Ctrl+C to stop the scheduler");

    tokio::signal::ctrl_c().await?;
    info!("Received interrupt signal, shutting down...");
    scheduler.shutdown().await?;

    Ok(())
}
