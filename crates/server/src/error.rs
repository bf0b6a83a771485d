//! JSON error responses.
//!
//! Every failure body carries `success: false` and a user-facing `error`
//! message. Internal causes are logged, not returned.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub const SERVER_ERROR: &str = "服务器错误";

#[derive(Debug)]
pub enum ApiError {
    /// Missing or malformed input (400)
    BadRequest(String),

    /// Missing or wrong cron secret (401)
    Unauthorized,

    /// Resource not found (404)
    NotFound(String),

    /// Upstream fetch failed (500), with the cause as `details`
    Upstream { error: String, details: String },

    /// Operation failed (500), message returned as is
    Failed(String),

    /// Internal error (500, logged); only `message` reaches the client
    Internal { message: String, cause: String },
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Upstream { .. } | Self::Failed(_) | Self::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Self::BadRequest(message) | Self::NotFound(message) | Self::Failed(message) => {
                json!({ "success": false, "error": message })
            }
            Self::Unauthorized => json!({ "success": false, "error": "未授权访问" }),
            Self::Upstream { error, details } => {
                json!({ "success": false, "error": error, "details": details })
            }
            Self::Internal { message, cause } => {
                tracing::error!("{}: {}", message, cause);
                json!({ "success": false, "error": message })
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<common::Error> for ApiError {
    fn from(e: common::Error) -> Self {
        Self::Internal {
            message: SERVER_ERROR.to_string(),
            cause: e.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        tracing::warn!("Rejected request body: {}", e.body_text());
        Self::BadRequest("请求格式无效".to_string())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        tracing::warn!("Rejected query string: {}", e.body_text());
        Self::BadRequest("查询参数无效".to_string())
    }
}

/// Attaches a client-facing message to a datastore or upstream failure.
pub trait ApiContext<T> {
    fn api_context(self, message: &str) -> Result<T, ApiError>;
}

impl<T> ApiContext<T> for common::Result<T> {
    fn api_context(self, message: &str) -> Result<T, ApiError> {
        self.map_err(|e| ApiError::Internal {
            message: message.to_string(),
            cause: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body(error: ApiError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn internal_errors_hide_their_cause() {
        let error: Result<(), _> = Err(common::Error::Supabase {
            status: 500,
            message: "relation does not exist".into(),
        });
        let (status, value) = body(error.api_context("查询失败").unwrap_err()).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(value, json!({"success": false, "error": "查询失败"}));
    }

    #[tokio::test]
    async fn upstream_errors_carry_details() {
        let (status, value) = body(ApiError::Upstream {
            error: "API 调用失败".into(),
            details: "timeout".into(),
        })
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(value["details"], "timeout");
        assert_eq!(value["success"], false);
    }

    #[tokio::test]
    async fn unauthorized_shape() {
        let (status, value) = body(ApiError::Unauthorized).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(value["error"], "未授权访问");
    }
}
