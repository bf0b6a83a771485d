use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use common::Config;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::server::router;
use crate::state::AppState;

pub const CRON_SECRET: &str = "test-cron-secret";

/// A router whose datastore and LLM both point at one mock server.
pub struct TestApp {
    pub router: Router,
    pub datastore: MockServer,
}

impl TestApp {
    pub async fn start() -> Self {
        let datastore = MockServer::start().await;
        let uri = datastore.uri();
        let config = Config::from_lookup(|name| match name {
            "SUPABASE_URL" => Some(uri.clone()),
            "SUPABASE_SERVICE_ROLE_KEY" => Some("service-key".to_string()),
            "OPENROUTER_BASE_URL" => Some(format!("{uri}/api/v1")),
            "OPENROUTER_API_KEY" => Some("sk-test".to_string()),
            "CRON_SECRET_KEY" => Some(CRON_SECRET.to_string()),
            "REWRITE_TASK_DELAY_MS" | "HOTLIST_FETCH_DELAY_MS" => Some("0".to_string()),
            _ => None,
        })
        .unwrap();

        let state = AppState::from_config(&config).unwrap();
        Self {
            router: router(Arc::new(state)),
            datastore,
        }
    }

    pub async fn reject_all_writes(&self) {
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({"message": "boom"})))
            .mount(&self.datastore)
            .await;
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn call(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}
