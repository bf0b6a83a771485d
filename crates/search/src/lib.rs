//! Hot list search: filter parsing, predicate building and result shaping.

pub mod filters;
pub mod text;

use common::{PageInfo, Result, SupabaseClient};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tophub::models::popularity_score;
use tophub::registry;
use tracing::info;

pub use filters::{build_query, DateRange, SearchFilters, SearchParams, SearchTerms, SortBy};
pub use text::{
    calculate_match_score, format_search_stats, generate_search_suggestions, highlight_text,
    parse_search_query, validate_search_query, InvalidQuery, ParsedQuery,
};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HotListRef {
    pub name: Option<String>,
    pub hashid: Option<String>,
    pub category: Option<String>,
}

/// A `hot_list_items` row with its embedded list.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemRow {
    pub hot_list_hashid: String,
    pub item_hash: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub extra: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub collected_at: OffsetDateTime,
    #[serde(default)]
    pub hot_lists: Option<HotListRef>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub url: String,
    pub popularity_score: i64,
    pub read_count: String,
    #[serde(with = "time::serde::rfc3339")]
    pub publish_time: OffsetDateTime,
    pub author: String,
    pub category: String,
    pub source: String,
    pub platform: String,
    pub match_score: usize,
    pub highlighted_title: String,
}

impl SearchHit {
    pub fn from_row(row: ItemRow, query: &str, terms: &[String]) -> Self {
        let list = row.hot_lists.unwrap_or_default();
        let platform = list.hashid.unwrap_or_default();
        let category = list
            .category
            .filter(|c| !c.trim().is_empty())
            .or_else(|| registry::find(&row.hot_list_hashid).map(|spec| spec.category.to_string()))
            .unwrap_or_else(|| "未知".to_string());
        let extra = row.extra.unwrap_or_default();
        let summary = row.description.unwrap_or_default();

        Self {
            id: format!("{}_{}", row.hot_list_hashid, row.item_hash),
            match_score: calculate_match_score(&row.title, terms)
                + calculate_match_score(&summary, terms),
            highlighted_title: highlight_text(&row.title, query),
            title: row.title,
            summary,
            url: row.url.unwrap_or_default(),
            popularity_score: popularity_score(&extra),
            read_count: if extra.is_empty() { "0".to_string() } else { extra },
            publish_time: row.collected_at,
            author: "热榜作者".to_string(),
            category,
            source: list.name.unwrap_or_else(|| "未知来源".to_string()),
            platform,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchPage {
    pub data: Vec<SearchHit>,
    pub pagination: PageInfo,
}

/// Runs a hot list search. A blank query matches nothing and skips the
/// datastore entirely.
pub async fn search(
    supabase: &SupabaseClient,
    filters: &SearchFilters,
    now: OffsetDateTime,
) -> Result<SearchPage> {
    if filters.query.trim().is_empty() {
        return Ok(SearchPage {
            data: Vec::new(),
            pagination: filters.page.info(0),
        });
    }

    let terms = SearchTerms::from_filters(filters);
    let query = build_query(filters, &terms, now);
    let (rows, total) = supabase.select_with_count::<ItemRow>(&query).await?;

    let text_terms = terms.all_text_terms();
    let mut data: Vec<SearchHit> = rows
        .into_iter()
        .map(|row| SearchHit::from_row(row, &filters.query, &text_terms))
        .collect();

    // `extra` sorts as text in the datastore; order the page numerically.
    if filters.sort == SortBy::Popularity {
        data.sort_by(|a, b| b.popularity_score.cmp(&a.popularity_score));
    }

    info!(
        "Search '{}' matched {} items ({} on this page)",
        filters.query,
        total,
        data.len()
    );

    Ok(SearchPage {
        data,
        pagination: filters.page.info(total),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn filters(q: &str) -> SearchFilters {
        SearchFilters::from(SearchParams {
            q: Some(q.to_string()),
            ..Default::default()
        })
    }

    #[test]
    fn maps_row_with_defaults() {
        let row: ItemRow = serde_json::from_value(json!({
            "hot_list_hashid": "zzz",
            "item_hash": "abc",
            "title": "AI 新闻",
            "description": null,
            "collected_at": "2024-01-15T10:00:00.123456+00:00"
        }))
        .unwrap();

        let hit = SearchHit::from_row(row, "ai", &["ai".to_string()]);
        assert_eq!(hit.id, "zzz_abc");
        assert_eq!(hit.summary, "");
        assert_eq!(hit.read_count, "0");
        assert_eq!(hit.popularity_score, 0);
        assert_eq!(hit.category, "未知");
        assert_eq!(hit.source, "未知来源");
        assert_eq!(hit.platform, "");
        assert_eq!(hit.match_score, 4);
        assert!(hit.highlighted_title.starts_with("<mark"));
    }

    #[test]
    fn embedded_category_wins_over_registry() {
        let row = |category: serde_json::Value| -> ItemRow {
            serde_json::from_value(json!({
                "hot_list_hashid": "5PdMaaadmg",
                "item_hash": "abc",
                "title": "标题",
                "collected_at": "2024-01-15T10:00:00Z",
                "hot_lists": {"name": "微信科技24小时热文榜", "hashid": "5PdMaaadmg",
                              "category": category}
            }))
            .unwrap()
        };

        let hit = SearchHit::from_row(row(json!("数码")), "标题", &[]);
        assert_eq!(hit.category, "数码");

        let hit = SearchHit::from_row(row(json!(null)), "标题", &[]);
        assert_eq!(hit.category, "科技");
    }

    #[tokio::test]
    async fn blank_query_skips_datastore() {
        let server = MockServer::start().await;
        let client = SupabaseClient::new(&format!("{}/rest/v1", server.uri()), "key");

        let page = search(&client, &filters("   "), OffsetDateTime::now_utc())
            .await
            .unwrap();
        assert!(page.data.is_empty());
        assert_eq!(page.pagination.total, 0);
        assert_eq!(page.pagination.pages, 0);
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn popularity_page_is_sorted_numerically() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/hot_list_items"))
            .and(query_param("order", "extra.desc"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Range", "0-1/45")
                    .set_body_json(json!([
                        {
                            "hot_list_hashid": "5PdMaaadmg",
                            "item_hash": "a",
                            "title": "AI 九",
                            "extra": "9 万热度",
                            "collected_at": "2024-01-15T10:00:00Z",
                            "hot_lists": {"name": "微信科技24小时热文榜", "hashid": "5PdMaaadmg"}
                        },
                        {
                            "hot_list_hashid": "5PdMaaadmg",
                            "item_hash": "b",
                            "title": "AI 四百",
                            "extra": "455 万热度",
                            "collected_at": "2024-01-15T10:00:00Z",
                            "hot_lists": {"name": "微信科技24小时热文榜", "hashid": "5PdMaaadmg"}
                        }
                    ])),
            )
            .mount(&server)
            .await;

        let client = SupabaseClient::new(&format!("{}/rest/v1", server.uri()), "key");
        let page = search(&client, &filters("AI"), datetime!(2024-01-16 00:00 UTC))
            .await
            .unwrap();

        assert_eq!(page.pagination.total, 45);
        assert_eq!(page.pagination.pages, 3);
        assert_eq!(page.data[0].popularity_score, 455);
        assert_eq!(page.data[1].popularity_score, 9);
        assert_eq!(page.data[0].category, "科技");
        assert_eq!(page.data[0].source, "微信科技24小时热文榜");
    }
}
