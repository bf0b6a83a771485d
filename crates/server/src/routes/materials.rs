//! Material library endpoints: collect, list, publish, and manual links.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use common::Error;
use rewrite::{
    CollectedItem, MaterialFilters, MaterialListParams, NewMaterial, PublishOutcome, RecordId,
};
use serde::Deserialize;
use serde_json::{json, Value};
use time::OffsetDateTime;
use tracing::{error, info};

use crate::error::{ApiContext, ApiError};
use crate::state::AppState;

const MISSING_PARAMS: &str = "缺少必要参数";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMaterialRequest {
    #[serde(default)]
    pub hot_list_item: Option<CollectedItem>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseUrlRequest {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    #[serde(default)]
    pub material_id: Option<RecordId>,
    #[serde(default)]
    pub user_id: Option<String>,
}

fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Queues the first rewrite of a new material. The material is already
/// stored, so a failure here is only logged.
async fn queue_rewrite(state: &AppState, material_id: &RecordId, user_id: &str) {
    if let Err(e) = state.processor.enqueue(material_id.clone(), user_id).await {
        error!("Could not queue rewrite for material {}: {}", material_id, e);
    }
}

/// POST /api/materials/add - save a hot list item
async fn add_material(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AddMaterialRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    let (Some(item), Some(user_id)) = (request.hot_list_item, required(request.user_id)) else {
        return Err(ApiError::bad_request(MISSING_PARAMS));
    };

    let existing = state
        .materials
        .find_duplicate(&user_id, item.source_name(), &item.item_id)
        .await
        .api_context("检查失败")?;
    if let Some(material_id) = existing {
        info!("Material {} already collected by {}", material_id, user_id);
        return Ok(Json(json!({
            "success": false,
            "error": "该内容已存在于素材库中",
            "materialId": material_id,
        })));
    }

    let material = state
        .materials
        .insert(&NewMaterial::from_hot_list_item(&item, &user_id))
        .await
        .api_context("添加失败")?;
    queue_rewrite(&state, &material.id, &user_id).await;

    Ok(Json(json!({
        "success": true,
        "materialId": material.id,
        "message": "已添加到素材库并开始AI改写",
    })))
}

/// GET /api/materials/list
async fn list_materials(
    State(state): State<Arc<AppState>>,
    params: Result<Query<MaterialListParams>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(params) = params?;
    let filters =
        MaterialFilters::from_params(params).ok_or_else(|| ApiError::bad_request("缺少用户ID"))?;

    let page = state
        .materials
        .list(&filters)
        .await
        .api_context("查询失败")?;

    Ok(Json(json!({
        "success": true,
        "data": page.data,
        "pagination": filters.page.info(page.total),
        "stats": page.stats,
    })))
}

/// POST /api/materials/publish - mark a rewritten material as published
async fn publish_material(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PublishRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    let (Some(material_id), Some(user_id)) = (request.material_id, required(request.user_id))
    else {
        return Err(ApiError::bad_request(MISSING_PARAMS));
    };

    match state.materials.publish(&material_id, &user_id).await {
        Ok(PublishOutcome::Published) => Ok(Json(json!({
            "success": true,
            "message": "素材已发布",
        }))),
        Ok(PublishOutcome::NotRewritten(status)) => Err(ApiError::bad_request(format!(
            "只有已改写的素材可以发布（当前状态：{}）",
            status.as_str()
        ))),
        Err(Error::NotFound { .. }) => Err(ApiError::not_found("素材不存在")),
        Err(e) => Err(e).api_context("发布失败"),
    }
}

/// POST /api/parse-url - save a manually submitted link
async fn parse_url(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ParseUrlRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    let (Some(url), Some(user_id)) = (required(request.url), required(request.user_id)) else {
        return Err(ApiError::bad_request(MISSING_PARAMS));
    };
    if reqwest::Url::parse(url.trim()).is_err() {
        return Err(ApiError::bad_request("无效的URL格式"));
    }

    let metadata = state
        .openrouter
        .extract_url_metadata(url.trim())
        .await
        .map_err(|e| {
            error!("Could not read link {}: {}", url, e);
            ApiError::Failed("处理失败，请稍后重试".to_string())
        })?;
    let new_material =
        NewMaterial::from_url_metadata(url.trim(), &metadata, &user_id, OffsetDateTime::now_utc());
    let material = state
        .materials
        .insert(&new_material)
        .await
        .api_context("添加素材失败")?;
    queue_rewrite(&state, &material.id, &user_id).await;

    Ok(Json(json!({
        "success": true,
        "material": material,
        "message": "链接已添加到素材库并开始AI改写",
    })))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/materials/add", post(add_material))
        .route("/api/materials/list", get(list_materials))
        .route("/api/materials/publish", post(publish_material))
        .route("/api/parse-url", post(parse_url))
}

#[cfg(test)]
mod tests {
    use crate::test_support::{call, get, post_json, TestApp};
    use axum::http::StatusCode;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, ResponseTemplate};

    #[tokio::test]
    async fn add_requires_item_and_user() {
        let app = TestApp::start().await;
        let (status, body) = call(
            &app.router,
            post_json("/api/materials/add", json!({"userId": "u1"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "缺少必要参数");
    }

    #[tokio::test]
    async fn malformed_body_is_a_bad_request() {
        let app = TestApp::start().await;
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/api/materials/add")
            .header("content-type", "application/json")
            .body(axum::body::Body::from("{not json"))
            .unwrap();

        let (status, body) = call(&app.router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn duplicate_item_returns_existing_id() {
        let app = TestApp::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/materials"))
            .and(query_param("source", "eq.少数派热门文章"))
            .and(query_param("source_id", "eq.abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 12}])))
            .mount(&app.datastore)
            .await;

        let (status, body) = call(
            &app.router,
            post_json(
                "/api/materials/add",
                json!({
                    "userId": "u1",
                    "hotListItem": {"listHashId": "Y2KeDGQdNP", "itemId": "abc", "title": "t"}
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
        assert_eq!(body["materialId"], 12);
    }

    #[tokio::test]
    async fn new_item_is_saved_and_queued() {
        let app = TestApp::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/materials"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&app.datastore)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/materials"))
            .and(body_partial_json(json!({
                "source": "少数派热门文章",
                "material_status": "collected",
                "tags": ["科技"]
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([
                {"id": 33, "user_id": "u1", "title": "t", "material_status": "collected"}
            ])))
            .expect(1)
            .mount(&app.datastore)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rewrite_tasks"))
            .and(body_partial_json(json!({"material_id": 33, "priority": 5})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([{"id": 7}])))
            .expect(1)
            .mount(&app.datastore)
            .await;

        let (status, body) = call(
            &app.router,
            post_json(
                "/api/materials/add",
                json!({
                    "userId": "u1",
                    "hotListItem": {"listHashId": "Y2KeDGQdNP", "itemId": "abc",
                                    "title": "t", "category": "科技"}
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["materialId"], 33);
    }

    #[tokio::test]
    async fn list_requires_user_and_reports_stats() {
        let app = TestApp::start().await;
        let (status, _) = call(&app.router, get("/api/materials/list")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        Mock::given(method("GET"))
            .and(path("/rest/v1/materials"))
            .and(query_param("select", "material_status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"material_status": "collected"},
                {"material_status": "rewritten"},
                {"material_status": "rewritten"}
            ])))
            .mount(&app.datastore)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/materials"))
            .and(query_param("order", "created_at.desc"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Range", "0-0/1")
                    .set_body_json(json!([
                        {"id": 1, "user_id": "u1", "title": "t", "material_status": "rewritten",
                         "rewrite_results": [{"id": 5, "rewritten_title": "新"}]}
                    ])),
            )
            .mount(&app.datastore)
            .await;

        let (status, body) = call(
            &app.router,
            get("/api/materials/list?userId=u1&status=%E5%85%A8%E9%83%A8"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pagination"]["total"], 1);
        assert_eq!(body["pagination"]["pages"], 1);
        assert_eq!(body["stats"]["rewritten"], 2);
        assert_eq!(body["stats"]["total"], 1);
        assert_eq!(body["data"][0]["rewrite_results"][0]["rewritten_title"], "新");
    }

    #[tokio::test]
    async fn parse_url_validates_input() {
        let app = TestApp::start().await;

        let (status, body) = call(
            &app.router,
            post_json("/api/parse-url", json!({"url": "https://a.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "缺少必要参数");

        let (status, body) = call(
            &app.router,
            post_json("/api/parse-url", json!({"url": "not a url", "userId": "u1"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "无效的URL格式");
    }

    #[tokio::test]
    async fn parsed_link_is_saved_and_queued() {
        let app = TestApp::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content":
                    "{\"title\": \"链接标题\", \"summary\": \"摘要\", \"category\": \"财经\"}"}}]
            })))
            .mount(&app.datastore)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/materials"))
            .and(body_partial_json(json!({
                "title": "链接标题",
                "url": "http://127.0.0.1:9/a/1",
                "source": "人工添加",
                "category": "财经",
                "material_status": "collected",
                "user_id": "u1"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([
                {"id": 41, "user_id": "u1", "title": "链接标题", "material_status": "collected"}
            ])))
            .expect(1)
            .mount(&app.datastore)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rewrite_tasks"))
            .and(body_partial_json(json!({"material_id": 41})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([{"id": 7}])))
            .expect(1)
            .mount(&app.datastore)
            .await;

        let (status, body) = call(
            &app.router,
            post_json(
                "/api/parse-url",
                json!({"url": "http://127.0.0.1:9/a/1", "userId": "u1"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["material"]["id"], 41);
        assert_eq!(body["message"], "链接已添加到素材库并开始AI改写");

        let requests = app.datastore.received_requests().await.unwrap();
        let insert = requests
            .iter()
            .find(|r| r.url.path() == "/rest/v1/materials")
            .unwrap();
        let row: serde_json::Value = serde_json::from_slice(&insert.body).unwrap();
        assert!(row["source_id"].as_str().unwrap().starts_with("manual_"));
    }

    #[tokio::test]
    async fn unreadable_link_is_a_server_error() {
        let app = TestApp::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/materials"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([{"id": 1}])))
            .expect(0)
            .mount(&app.datastore)
            .await;

        let (status, body) = call(
            &app.router,
            post_json(
                "/api/parse-url",
                json!({"url": "http://127.0.0.1:9/a/1", "userId": "u1"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "处理失败，请稍后重试");
    }

    #[tokio::test]
    async fn publish_checks_ownership_and_status() {
        let app = TestApp::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/materials"))
            .and(query_param("id", "eq.1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 1, "user_id": "u1", "title": "t", "material_status": "rewriting"}
            ])))
            .mount(&app.datastore)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/materials"))
            .and(query_param("id", "eq.2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&app.datastore)
            .await;

        let (status, _) = call(
            &app.router,
            post_json("/api/materials/publish", json!({"materialId": 1, "userId": "u1"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(
            &app.router,
            post_json("/api/materials/publish", json!({"materialId": 2, "userId": "u1"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "素材不存在");
    }
}
