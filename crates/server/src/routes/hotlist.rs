use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use search::{format_search_stats, validate_search_query, InvalidQuery, SearchFilters, SearchParams};
use serde_json::{json, Value};
use time::OffsetDateTime;

use crate::error::{ApiContext, ApiError};
use crate::state::AppState;

/// GET /api/hotlist/search
async fn search_hot_lists(
    State(state): State<Arc<AppState>>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(params) = params?;
    let filters = SearchFilters::from(params);

    // Blank and short queries are answered with an empty page below.
    if let Err(e @ InvalidQuery::TooLong) = validate_search_query(&filters.query) {
        return Err(ApiError::bad_request(e.to_string()));
    }

    let page = search::search(&state.supabase, &filters, OffsetDateTime::now_utc())
        .await
        .api_context("搜索失败")?;

    Ok(Json(json!({
        "success": true,
        "message": format_search_stats(page.pagination.total, &filters.query),
        "data": page.data,
        "pagination": page.pagination,
        "query": filters.query,
    })))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/hotlist/search", get(search_hot_lists))
}
