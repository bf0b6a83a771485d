//! Rewrite task endpoints: the cron trigger, single-task processing and
//! task history.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use common::Error;
use rewrite::{RecordId, TaskSelector};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::{ApiContext, ApiError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    #[serde(default)]
    pub task_id: Option<RecordId>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryParams {
    pub task_id: Option<String>,
    pub material_id: Option<String>,
}

/// Accepts only `Authorization: Bearer <secret>`. With no secret configured
/// nothing is accepted.
fn authorize(headers: &HeaderMap, secret: Option<&str>) -> Result<(), ApiError> {
    let provided = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    match (secret, provided) {
        (Some(secret), Some(header)) if header == format!("Bearer {secret}") => Ok(()),
        _ => {
            warn!("Rejected unauthorized cron request");
            Err(ApiError::Unauthorized)
        }
    }
}

/// GET|POST /api/rewrite/cron - process a batch of pending tasks
async fn run_cron(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    authorize(&headers, state.cron_secret.as_deref())?;

    let report = state
        .processor
        .run_batch()
        .await
        .api_context("获取任务失败")?;

    if report.processed == 0 {
        return Ok(Json(json!({
            "success": true,
            "message": "暂无待处理任务",
            "processed": 0,
        })));
    }

    Ok(Json(json!({
        "success": true,
        "processed": report.processed,
        "results": report.results,
    })))
}

/// DELETE /api/rewrite/cron - purge old completed tasks
async fn purge(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    authorize(&headers, state.cron_secret.as_deref())?;

    state
        .processor
        .purge_completed()
        .await
        .api_context("清理失败")?;

    Ok(Json(json!({ "success": true, "message": "清理完成" })))
}

/// POST /api/rewrite/process - process one task now
async fn process_task(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ProcessRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    let task_id = request
        .task_id
        .ok_or_else(|| ApiError::bad_request("缺少任务ID"))?;
    let user_id = request.user_id.filter(|u| !u.trim().is_empty());

    info!("Processing rewrite task {} on request", task_id);
    match state
        .processor
        .process_by_id(&task_id, user_id.as_deref())
        .await
    {
        Ok(outcome) => Ok(Json(json!({ "success": true, "result": outcome }))),
        Err(Error::NotFound {
            resource: "rewrite_task",
            ..
        }) => Err(ApiError::not_found("任务不存在")),
        Err(Error::NotFound {
            resource: "material",
            ..
        }) => Err(ApiError::not_found("素材不存在")),
        Err(e) => Err(ApiError::Failed(e.to_string())),
    }
}

/// GET /api/rewrite/process?taskId|materialId - task history
async fn task_history(
    State(state): State<Arc<AppState>>,
    params: Result<Query<HistoryParams>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(params) = params?;

    let selector = match (
        params.task_id.as_deref().and_then(RecordId::parse),
        params.material_id.as_deref().and_then(RecordId::parse),
    ) {
        (Some(task_id), _) => TaskSelector::Task(task_id),
        (None, Some(material_id)) => TaskSelector::Material(material_id),
        (None, None) => return Err(ApiError::bad_request("缺少任务ID或素材ID")),
    };

    let tasks = state
        .processor
        .task_history(&selector)
        .await
        .api_context("查询失败")?;

    Ok(Json(json!({ "success": true, "tasks": tasks })))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/rewrite/cron",
            get(run_cron).post(run_cron).delete(purge),
        )
        .route("/api/rewrite/process", post(process_task).get(task_history))
}
