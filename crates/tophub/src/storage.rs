use common::{Query, Result, SupabaseClient};
use time::OffsetDateTime;
use tracing::{error, info};

use crate::models::{HotListItemRow, HotListRow, TopHubNode};

pub const HOT_LISTS_TABLE: &str = "hot_lists";
pub const HOT_LIST_ITEMS_TABLE: &str = "hot_list_items";
const ITEM_CONFLICT_TARGET: &str = "hot_list_hashid,item_hash";

#[derive(Clone)]
pub struct HotListStore {
    supabase: SupabaseClient,
}

impl HotListStore {
    pub fn new(supabase: SupabaseClient) -> Self {
        Self { supabase }
    }

    /// Persists the list metadata and its items, returning how many items
    /// were written. Metadata failures are logged and tolerated; item
    /// failures are returned.
    pub async fn save(&self, hash_id: &str, node: &TopHubNode) -> Result<usize> {
        let now = OffsetDateTime::now_utc();
        let list_row = HotListRow {
            hashid: hash_id.to_string(),
            name: node.name.clone(),
            display: node.display.clone(),
            domain: node.domain.clone(),
            logo: node.logo.clone(),
            last_updated: now,
        };

        if let Err(e) = self.save_list(&list_row).await {
            error!("Failed to save hot list {}: {}", hash_id, e);
        }

        let rows: Vec<HotListItemRow> = node
            .items
            .iter()
            .map(|item| HotListItemRow::from_item(hash_id, item, now))
            .collect();

        if rows.is_empty() {
            return Ok(0);
        }

        self.supabase
            .upsert(HOT_LIST_ITEMS_TABLE, &rows, ITEM_CONFLICT_TARGET)
            .await?;

        info!("Saved {} hot list items for {}", rows.len(), hash_id);
        Ok(rows.len())
    }

    async fn save_list(&self, row: &HotListRow) -> Result<()> {
        let existing: Option<serde_json::Value> = self
            .supabase
            .select_single(
                &Query::from(HOT_LISTS_TABLE)
                    .select("hashid")
                    .eq("hashid", &row.hashid),
            )
            .await?;

        if existing.is_some() {
            self.supabase
                .update(&Query::from(HOT_LISTS_TABLE).eq("hashid", &row.hashid), row)
                .await
        } else {
            self.supabase.upsert(HOT_LISTS_TABLE, row, "hashid").await
        }
    }
}
