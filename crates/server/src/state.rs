use std::sync::Arc;

use common::{Config, Result, SupabaseClient};
use openrouter::OpenRouterClient;
use rewrite::{MaterialLibrary, SupabaseTaskProcessor, SupabaseTaskStore, TaskProcessor};
use tophub::TopHubCrawler;

/// Shared application state
pub struct AppState {
    pub supabase: SupabaseClient,
    pub crawler: Arc<TopHubCrawler>,
    pub materials: MaterialLibrary,
    pub openrouter: OpenRouterClient,
    pub processor: Arc<SupabaseTaskProcessor>,
    /// Bearer secret for the cron endpoints. Unset rejects every caller.
    pub cron_secret: Option<String>,
}

impl AppState {
    pub fn from_config(config: &Config) -> Result<Self> {
        let supabase = SupabaseClient::from_config(&config.supabase);
        let openrouter = OpenRouterClient::new(&config.openrouter)?;

        Ok(Self {
            crawler: Arc::new(TopHubCrawler::new(config, supabase.clone())),
            materials: MaterialLibrary::new(supabase.clone()),
            processor: Arc::new(TaskProcessor::new(
                SupabaseTaskStore::new(supabase.clone()),
                openrouter.clone(),
                &config.rewrite,
            )),
            openrouter,
            cron_secret: config.cron_secret.clone(),
            supabase,
        })
    }
}
