pub mod api;
pub mod models;
pub mod placeholder;
pub mod registry;
pub mod source;
pub mod storage;

use std::time::Duration;

use async_trait::async_trait;
use common::{Config, Crawler, Error, Result, SupabaseClient};
use time::OffsetDateTime;
use tracing::{error, info, warn};

pub use api::TopHubApi;
pub use models::{ListRefresh, ProcessedItem, RefreshReport};
pub use placeholder::PlaceholderSource;
pub use registry::{HotListSpec, HOT_LISTS};
pub use source::HotListSource;
pub use storage::HotListStore;

use models::{popularity_score, ListOutcome, RefreshStatus, TopHubNode};

pub struct TopHubCrawler {
    live: Option<Box<dyn HotListSource>>,
    fallback: Box<dyn HotListSource>,
    store: HotListStore,
    fetch_delay: Duration,
}

impl TopHubCrawler {
    pub fn new(config: &Config, supabase: SupabaseClient) -> Self {
        let live = config
            .tophub
            .live_api_key()
            .map(|key| Box::new(TopHubApi::new(&config.tophub.base_url, key)) as Box<dyn HotListSource>);
        if live.is_none() {
            info!("No TopHub API key configured, hot lists will use placeholder data");
        }

        Self {
            live,
            fallback: Box::new(PlaceholderSource),
            store: HotListStore::new(supabase),
            fetch_delay: config.tophub.fetch_delay,
        }
    }

    pub fn with_sources(
        live: Option<Box<dyn HotListSource>>,
        fallback: Box<dyn HotListSource>,
        store: HotListStore,
        fetch_delay: Duration,
    ) -> Self {
        Self {
            live,
            fallback,
            store,
            fetch_delay,
        }
    }

    /// Live data when available, otherwise the fallback source.
    async fn fetch_node(&self, spec: &HotListSpec) -> Result<TopHubNode> {
        if let Some(live) = &self.live {
            match live.fetch(spec).await {
                Ok(node) => return Ok(node),
                Err(e) => warn!(
                    "{} fetch failed for {}, falling back to {}: {}",
                    live.name(),
                    spec.hash_id,
                    self.fallback.name(),
                    e
                ),
            }
        }
        self.fallback.fetch(spec).await
    }

    /// Collects and stores a single registered list.
    pub async fn refresh_one(&self, hash_id: &str) -> Result<ListRefresh> {
        let spec = registry::find(hash_id).ok_or_else(|| Error::not_found("hot list", hash_id))?;
        info!("Collecting hot list: {}", spec.name);

        let node = self.fetch_node(spec).await?;
        let saved_count = self.store.save(spec.hash_id, &node).await?;

        let now = OffsetDateTime::now_utc();
        let items: Vec<ProcessedItem> = node
            .items
            .iter()
            .enumerate()
            .map(|(index, item)| ProcessedItem {
                list_hash_id: spec.hash_id.to_string(),
                item_id: item.item_id(),
                title: item.title.clone(),
                summary: item.description.clone(),
                url: item.url.clone(),
                popularity_score: popularity_score(&item.extra),
                read_count: item.extra.clone(),
                publish_time: now,
                author: format!("热榜作者{}", index + 1),
                category: spec.category.to_string(),
                is_collected: false,
                rank_position: index + 1,
            })
            .collect();

        info!(
            "Processed {} items for {}, saved {}",
            items.len(),
            spec.name,
            saved_count
        );

        Ok(ListRefresh {
            list_name: if node.name.is_empty() {
                spec.name.to_string()
            } else {
                node.name.clone()
            },
            category: spec.category.to_string(),
            items_count: items.len(),
            saved_count,
            items,
            update_time: now,
        })
    }

    /// Collects every registered list in order. One list failing does not
    /// stop the others.
    pub async fn refresh_all(&self) -> RefreshReport {
        info!("Refreshing all {} hot lists", HOT_LISTS.len());
        let mut outcomes = Vec::with_capacity(HOT_LISTS.len());

        for spec in HOT_LISTS.iter() {
            match self.refresh_one(spec.hash_id).await {
                Ok(refresh) => {
                    outcomes.push(ListOutcome {
                        hash_id: spec.hash_id.to_string(),
                        name: spec.name.to_string(),
                        category: spec.category.to_string(),
                        items_count: refresh.items_count,
                        saved_count: refresh.saved_count,
                        status: RefreshStatus::Success,
                        update_time: Some(refresh.update_time),
                        error: None,
                    });
                    tokio::time::sleep(self.fetch_delay).await;
                }
                Err(e) => {
                    error!("Hot list {} failed: {}", spec.name, e);
                    outcomes.push(ListOutcome {
                        hash_id: spec.hash_id.to_string(),
                        name: spec.name.to_string(),
                        category: spec.category.to_string(),
                        items_count: 0,
                        saved_count: 0,
                        status: RefreshStatus::Failed,
                        update_time: None,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        let report = RefreshReport::from_outcomes(outcomes);
        info!(
            "Hot list refresh finished: {}/{} lists, {} items, {} saved",
            report.summary.success_count,
            report.summary.total_lists,
            report.summary.total_items,
            report.summary.total_saved
        );
        report
    }
}

#[async_trait]
impl Crawler for TopHubCrawler {
    async fn run(&self) -> Result<()> {
        let report = self.refresh_all().await;
        if report.summary.failed_count > 0 {
            return Err(Error::Api(format!(
                "{} of {} hot lists failed",
                report.summary.failed_count, report.summary.total_lists
            )));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "TopHub"
    }
}
