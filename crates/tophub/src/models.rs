use common::serde_util::null_as_default as nullable;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TopHubItem {
    #[serde(default, deserialize_with = "nullable")]
    pub title: String,
    #[serde(default, deserialize_with = "nullable")]
    pub description: String,
    #[serde(default, deserialize_with = "nullable")]
    pub thumbnail: String,
    #[serde(default, deserialize_with = "nullable")]
    pub url: String,
    /// Popularity blurb such as "455 万热度".
    #[serde(default, deserialize_with = "nullable")]
    pub extra: String,
}

impl TopHubItem {
    /// Dedup key stored with each collected item.
    pub fn content_hash(&self) -> String {
        md5_hex(&format!("{}{}{}", self.title, self.url, self.description))
    }

    /// Identifier handed to clients; materials reference it as `source_id`.
    pub fn item_id(&self) -> String {
        md5_hex(&format!("{}{}", self.title, self.url))
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TopHubNode {
    #[serde(default, deserialize_with = "nullable")]
    pub hashid: String,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub display: String,
    #[serde(default, deserialize_with = "nullable")]
    pub domain: String,
    #[serde(default, deserialize_with = "nullable")]
    pub logo: String,
    #[serde(default, deserialize_with = "nullable")]
    pub items: Vec<TopHubItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TopHubResponse {
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub data: TopHubNode,
}

/// Row of the `hot_lists` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotListRow {
    pub hashid: String,
    pub name: String,
    pub display: String,
    pub domain: String,
    pub logo: String,
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
}

/// Row of the `hot_list_items` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotListItemRow {
    pub hot_list_hashid: String,
    pub title: String,
    pub description: String,
    pub thumbnail: String,
    pub url: String,
    pub extra: String,
    pub item_hash: String,
    #[serde(with = "time::serde::rfc3339")]
    pub collected_at: OffsetDateTime,
}

impl HotListItemRow {
    pub fn from_item(hash_id: &str, item: &TopHubItem, collected_at: OffsetDateTime) -> Self {
        Self {
            hot_list_hashid: hash_id.to_string(),
            title: item.title.clone(),
            description: item.description.clone(),
            thumbnail: item.thumbnail.clone(),
            url: item.url.clone(),
            extra: item.extra.clone(),
            item_hash: item.content_hash(),
            collected_at,
        }
    }
}

/// A collected item as returned to clients after a refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedItem {
    pub list_hash_id: String,
    pub item_id: String,
    pub title: String,
    pub summary: String,
    pub url: String,
    pub popularity_score: i64,
    pub read_count: String,
    #[serde(with = "time::serde::rfc3339")]
    pub publish_time: OffsetDateTime,
    pub author: String,
    pub category: String,
    pub is_collected: bool,
    pub rank_position: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRefresh {
    pub list_name: String,
    pub category: String,
    pub items_count: usize,
    pub saved_count: usize,
    pub items: Vec<ProcessedItem>,
    #[serde(with = "time::serde::rfc3339")]
    pub update_time: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOutcome {
    pub hash_id: String,
    pub name: String,
    pub category: String,
    pub items_count: usize,
    pub saved_count: usize,
    pub status: RefreshStatus,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub update_time: Option<OffsetDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshSummary {
    pub total_lists: usize,
    pub success_count: usize,
    pub failed_count: usize,
    pub total_items: usize,
    pub total_saved: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    pub summary: RefreshSummary,
    pub results: Vec<ListOutcome>,
}

impl RefreshReport {
    pub fn from_outcomes(results: Vec<ListOutcome>) -> Self {
        let success_count = results
            .iter()
            .filter(|r| r.status == RefreshStatus::Success)
            .count();
        let summary = RefreshSummary {
            total_lists: results.len(),
            success_count,
            failed_count: results.len() - success_count,
            total_items: results.iter().map(|r| r.items_count).sum(),
            total_saved: results.iter().map(|r| r.saved_count).sum(),
        };
        Self { summary, results }
    }
}

/// Numeric popularity from a blurb like "455 万热度": its digits, or 0.
pub fn popularity_score(extra: &str) -> i64 {
    let digits: String = extra.chars().filter(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(0)
}

fn md5_hex(input: &str) -> String {
    format!("{:x}", md5::compute(input.as_bytes()))
}
