//! Hot list collection endpoints.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tophub::registry;
use tracing::{error, info};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchRequest {
    #[serde(default)]
    pub hash_id: Option<String>,
}

/// GET /api/tophub/fetch - refresh every registered list
async fn fetch_all(State(state): State<Arc<AppState>>) -> Json<Value> {
    let report = state.crawler.refresh_all().await;
    Json(json!({
        "success": true,
        "summary": report.summary,
        "results": report.results,
    }))
}

/// POST /api/tophub/fetch - refresh one list
async fn fetch_one(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<FetchRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;

    let hash_id = request
        .hash_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("缺少 hashId 参数"))?;
    if registry::find(&hash_id).is_none() {
        return Err(ApiError::bad_request("不支持的热榜类型"));
    }

    info!("Refreshing hot list {}", hash_id);
    let refresh = state.crawler.refresh_one(&hash_id).await.map_err(|e| {
        error!("Hot list {} refresh failed: {}", hash_id, e);
        ApiError::Upstream {
            error: "API 调用失败".to_string(),
            details: e.to_string(),
        }
    })?;

    Ok(Json(json!({ "success": true, "data": refresh })))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/tophub/fetch", get(fetch_all).post(fetch_one))
}
