//! The per-user material library.

use common::supabase_client::ilike_condition;
use common::{Error, PageRequest, Query, Result, SupabaseClient};
use openrouter::UrlMetadata;
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::OffsetDateTime;
use tophub::registry;
use tracing::info;

use crate::models::{Material, MaterialStatus, NewMaterial, RecordId};
use crate::store::MATERIALS_TABLE;

/// Filter value meaning "no filter".
pub const ALL: &str = "全部";

const DEFAULT_CATEGORY: &str = "其他";
const DEFAULT_AUTHOR: &str = "未知作者";

const LIST_COLUMNS: &str = "*,
    rewrite_results!material_id(
        id,
        rewritten_title,
        summary,
        quality_score,
        word_count,
        rewrite_status,
        created_at
    )";

/// A hot list item as submitted by a client that wants to keep it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectedItem {
    #[serde(default)]
    pub list_hash_id: String,
    #[serde(default)]
    pub item_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub publish_time: Option<String>,
    #[serde(default)]
    pub read_count: Option<String>,
    #[serde(default)]
    pub popularity_score: Option<i64>,
}

impl CollectedItem {
    pub fn source_name(&self) -> &'static str {
        registry::source_name(&self.list_hash_id)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl NewMaterial {
    /// A hot list item, saved with its summary standing in for the body.
    pub fn from_hot_list_item(item: &CollectedItem, user_id: &str) -> Self {
        let category = non_empty(item.category.as_deref())
            .unwrap_or(DEFAULT_CATEGORY)
            .to_string();

        Self {
            title: item.title.clone(),
            summary: item.summary.clone(),
            original_content: item.summary.clone(),
            url: item.url.clone(),
            source: item.source_name().to_string(),
            source_id: item.item_id.clone(),
            tags: vec![category.clone()],
            category,
            author: non_empty(item.author.as_deref())
                .unwrap_or(DEFAULT_AUTHOR)
                .to_string(),
            publish_time: item.publish_time.clone(),
            read_count: item.read_count.clone().unwrap_or_else(|| "0".to_string()),
            popularity_score: item.popularity_score.unwrap_or(0),
            material_status: MaterialStatus::Collected,
            user_id: user_id.to_string(),
        }
    }

    /// A manually submitted link. The source id is derived from the
    /// submission time in milliseconds.
    pub fn from_url_metadata(
        url: &str,
        metadata: &UrlMetadata,
        user_id: &str,
        now: OffsetDateTime,
    ) -> Self {
        let millis = now.unix_timestamp_nanos() / 1_000_000;
        let category = non_empty(Some(metadata.category.as_str()))
            .unwrap_or(DEFAULT_CATEGORY)
            .to_string();
        let summary = non_empty(Some(metadata.summary.as_str())).unwrap_or("无法获取摘要");

        Self {
            title: non_empty(Some(metadata.title.as_str()))
                .unwrap_or("未知标题")
                .to_string(),
            summary: summary.to_string(),
            original_content: non_empty(Some(metadata.summary.as_str()))
                .unwrap_or("内容待获取")
                .to_string(),
            url: url.to_string(),
            source: non_empty(Some(metadata.source.as_str()))
                .unwrap_or("人工添加")
                .to_string(),
            source_id: format!("manual_{millis}"),
            tags: vec![category.clone()],
            category,
            author: non_empty(Some(metadata.author.as_str()))
                .unwrap_or(DEFAULT_AUTHOR)
                .to_string(),
            publish_time: Some(metadata.publish_time.clone()),
            read_count: non_empty(Some(metadata.read_count.as_str()))
                .unwrap_or("0")
                .to_string(),
            popularity_score: metadata.popularity_score,
            material_status: MaterialStatus::Collected,
            user_id: user_id.to_string(),
        }
    }
}

/// Query-string state of the material list screen.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialListParams {
    pub user_id: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
    pub search: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialFilters {
    pub user_id: String,
    pub page: PageRequest,
    pub search: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub source: Option<String>,
}

fn active_filter(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && v != ALL)
}

impl MaterialFilters {
    /// `None` when the user id is missing.
    pub fn from_params(params: MaterialListParams) -> Option<Self> {
        let user_id = params
            .user_id
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())?;

        Some(Self {
            user_id,
            page: PageRequest::parse(params.page.as_deref(), params.limit.as_deref()),
            search: params
                .search
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            category: active_filter(params.category),
            status: active_filter(params.status).map(|s| s.to_lowercase()),
            source: active_filter(params.source),
        })
    }

    pub fn to_query(&self) -> Query {
        let mut query = Query::from(MATERIALS_TABLE)
            .select(LIST_COLUMNS)
            .eq("user_id", &self.user_id);

        if let Some(search) = &self.search {
            let pattern = format!("%{search}%");
            query = query.or([
                ilike_condition("title", &pattern),
                ilike_condition("summary", &pattern),
            ]);
        }
        if let Some(category) = &self.category {
            query = query.eq("category", category);
        }
        if let Some(status) = &self.status {
            query = query.eq("material_status", status);
        }
        if let Some(source) = &self.source {
            query = query.eq("source", source);
        }

        query
            .order("created_at", false)
            .range(self.page.offset(), self.page.range_end())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub total: i64,
    pub collected: i64,
    pub rewriting: i64,
    pub rewritten: i64,
    pub published: i64,
}

impl StatusCounts {
    /// Tallies per-status counts. `total` is the filtered listing total.
    pub fn tally<I>(total: i64, statuses: I) -> Self
    where
        I: IntoIterator<Item = MaterialStatus>,
    {
        let mut counts = Self {
            total,
            ..Default::default()
        };
        for status in statuses {
            match status {
                MaterialStatus::Collected => counts.collected += 1,
                MaterialStatus::Rewriting => counts.rewriting += 1,
                MaterialStatus::Rewritten => counts.rewritten += 1,
                MaterialStatus::Published => counts.published += 1,
            }
        }
        counts
    }
}

#[derive(Debug, Clone)]
pub struct MaterialPage {
    pub data: Vec<Material>,
    pub total: i64,
    pub stats: StatusCounts,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    Published,
    NotRewritten(MaterialStatus),
}

#[derive(Deserialize)]
struct IdRow {
    id: RecordId,
}

#[derive(Deserialize)]
struct StatusRow {
    #[serde(default)]
    material_status: Option<String>,
}

#[derive(Clone)]
pub struct MaterialLibrary {
    client: SupabaseClient,
}

impl MaterialLibrary {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    /// Id of the material this user already saved from the same source item.
    pub async fn find_duplicate(
        &self,
        user_id: &str,
        source: &str,
        source_id: &str,
    ) -> Result<Option<RecordId>> {
        let query = Query::from(MATERIALS_TABLE)
            .select("id")
            .eq("user_id", user_id)
            .eq("source", source)
            .eq("source_id", source_id);
        let row: Option<IdRow> = self.client.select_single(&query).await?;
        Ok(row.map(|r| r.id))
    }

    pub async fn insert(&self, material: &NewMaterial) -> Result<Material> {
        let stored: Material = self.client.insert(MATERIALS_TABLE, material).await?;
        info!("Saved material {} for user {}", stored.id, stored.user_id);
        Ok(stored)
    }

    pub async fn list(&self, filters: &MaterialFilters) -> Result<MaterialPage> {
        let (data, total) = self
            .client
            .select_with_count::<Material>(&filters.to_query())
            .await?;
        let stats = self.status_counts(&filters.user_id, total).await?;
        Ok(MaterialPage { data, total, stats })
    }

    /// Status breakdown across all of a user's materials.
    pub async fn status_counts(&self, user_id: &str, total: i64) -> Result<StatusCounts> {
        let query = Query::from(MATERIALS_TABLE)
            .select("material_status")
            .eq("user_id", user_id);
        let rows: Vec<StatusRow> = self.client.select(&query).await?;
        Ok(StatusCounts::tally(
            total,
            rows.iter()
                .filter_map(|r| r.material_status.as_deref())
                .filter_map(MaterialStatus::parse),
        ))
    }

    /// Marks a rewritten material as published. Missing materials and ones
    /// owned by another user are both reported as not found.
    pub async fn publish(&self, material_id: &RecordId, user_id: &str) -> Result<PublishOutcome> {
        let query = Query::from(MATERIALS_TABLE)
            .eq("id", material_id)
            .eq("user_id", user_id);
        let material: Material = self
            .client
            .select_single(&query)
            .await?
            .ok_or_else(|| Error::not_found("material", material_id))?;

        if !material
            .material_status
            .can_transition_to(MaterialStatus::Published)
        {
            return Ok(PublishOutcome::NotRewritten(material.material_status));
        }

        self.client
            .update(
                &query,
                &json!({ "material_status": MaterialStatus::Published }),
            )
            .await?;
        info!("Published material {}", material_id);
        Ok(PublishOutcome::Published)
    }
}
