use std::fmt;

use common::serde_util::null_as_default as nullable;
use openrouter::{RewriteOptions, RewriteOutput, RewriteType, Tone, Usage};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Retry cap used when a task row carries none.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Priority of tasks created for newly collected materials.
pub const DEFAULT_PRIORITY: i32 = 5;

/// Primary key of a datastore row. Tables may use integer or uuid keys, so
/// both are accepted and written back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl RecordId {
    /// Parses a client-supplied id, keeping numeric ids numeric.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        Some(
            raw.parse::<i64>()
                .map(Self::Int)
                .unwrap_or_else(|_| Self::Text(raw.to_string())),
        )
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        Self::Int(id)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self::Text(id.to_string())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// `pending → processing → completed | failed`, and `failed → pending`
    /// when a task is requeued.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Failed)
                | (Self::Failed, Self::Pending)
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaterialStatus {
    #[default]
    Collected,
    Rewriting,
    Rewritten,
    Published,
}

impl MaterialStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "collected" => Some(Self::Collected),
            "rewriting" => Some(Self::Rewriting),
            "rewritten" => Some(Self::Rewritten),
            "published" => Some(Self::Published),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Collected => "collected",
            Self::Rewriting => "rewriting",
            Self::Rewritten => "rewritten",
            Self::Published => "published",
        }
    }

    /// Forward workflow plus `rewriting → collected` after a final failure.
    pub fn can_transition_to(&self, next: MaterialStatus) -> bool {
        matches!(
            (self, next),
            (Self::Collected, Self::Rewriting)
                | (Self::Rewriting, Self::Rewritten)
                | (Self::Rewriting, Self::Collected)
                | (Self::Rewritten, Self::Rewriting)
                | (Self::Rewritten, Self::Published)
        )
    }
}

/// A row of `rewrite_results`, as embedded in material and task listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewriteResultRecord {
    pub id: RecordId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material_id: Option<RecordId>,
    #[serde(default)]
    pub rewritten_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewritten_content: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub quality_score: Option<f64>,
    #[serde(default)]
    pub word_count: Option<i64>,
    #[serde(default)]
    pub rewrite_status: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// A row of `materials`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub id: RecordId,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub original_content: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub source_id: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub publish_time: Option<String>,
    #[serde(default)]
    pub read_count: Option<String>,
    #[serde(default)]
    pub popularity_score: Option<i64>,
    #[serde(default)]
    pub material_status: MaterialStatus,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewrite_results: Option<Vec<RewriteResultRecord>>,
}

impl Material {
    /// Text handed to the rewriter: the stored article body, or the summary
    /// when no body was captured.
    pub fn rewrite_source(&self) -> &str {
        self.original_content
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .or(self.summary.as_deref())
            .unwrap_or_default()
    }
}

/// Insert payload for `materials`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewMaterial {
    pub title: String,
    pub summary: String,
    pub original_content: String,
    pub url: String,
    pub source: String,
    pub source_id: String,
    pub category: String,
    pub tags: Vec<String>,
    pub author: String,
    pub publish_time: Option<String>,
    pub read_count: String,
    pub popularity_score: i64,
    pub material_status: MaterialStatus,
    pub user_id: String,
}

/// A row of `rewrite_tasks`. Listings may embed the material and its results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewriteTask {
    pub id: RecordId,
    pub material_id: RecordId,
    pub user_id: String,
    #[serde(default)]
    pub rewrite_type: Option<String>,
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default)]
    pub target_audience: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub keywords: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub priority: i32,
    #[serde(default)]
    pub task_status: TaskStatus,
    #[serde(default, deserialize_with = "nullable")]
    pub error_count: u32,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default, deserialize_with = "nullable")]
    pub current_retry: u32,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub processing_started_at: Option<String>,
    #[serde(default)]
    pub processing_completed_at: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub materials: Option<Material>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewrite_results: Option<Vec<RewriteResultRecord>>,
}

impl RewriteTask {
    pub fn max_retries(&self) -> u32 {
        self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES)
    }

    pub fn rewrite_type(&self) -> RewriteType {
        self.rewrite_type
            .as_deref()
            .map(RewriteType::parse_or_default)
            .unwrap_or_default()
    }

    pub fn tone(&self) -> Tone {
        self.tone
            .as_deref()
            .map(Tone::parse_or_default)
            .unwrap_or_default()
    }

    pub fn options(&self) -> RewriteOptions {
        RewriteOptions {
            rewrite_type: self.rewrite_type(),
            tone: self.tone(),
            target_audience: self.target_audience.clone(),
            keywords: self.keywords.clone(),
            ..Default::default()
        }
    }
}

/// Insert payload for `rewrite_tasks`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewRewriteTask {
    pub material_id: RecordId,
    pub user_id: String,
    pub rewrite_type: RewriteType,
    pub tone: Tone,
    pub priority: i32,
}

impl NewRewriteTask {
    pub fn standard(material_id: RecordId, user_id: &str) -> Self {
        Self {
            material_id,
            user_id: user_id.to_string(),
            rewrite_type: RewriteType::Standard,
            tone: Tone::Neutral,
            priority: DEFAULT_PRIORITY,
        }
    }
}

/// Column changes applied to a task row. Unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_status: Option<TaskStatus>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub processing_started_at: Option<OffsetDateTime>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub processing_completed_at: Option<OffsetDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_retry: Option<u32>,
}

impl TaskPatch {
    pub fn processing(now: OffsetDateTime) -> Self {
        Self {
            task_status: Some(TaskStatus::Processing),
            processing_started_at: Some(now),
            ..Default::default()
        }
    }

    pub fn completed(now: OffsetDateTime) -> Self {
        Self {
            task_status: Some(TaskStatus::Completed),
            processing_completed_at: Some(now),
            ..Default::default()
        }
    }

    pub fn failed(message: &str, error_count: u32, now: OffsetDateTime) -> Self {
        Self {
            task_status: Some(TaskStatus::Failed),
            error_message: Some(message.to_string()),
            error_count: Some(error_count),
            processing_completed_at: Some(now),
            ..Default::default()
        }
    }

    pub fn requeue(next_retry: u32) -> Self {
        Self {
            task_status: Some(TaskStatus::Pending),
            current_retry: Some(next_retry),
            ..Default::default()
        }
    }
}

/// Insert payload for `rewrite_results`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewRewriteResult {
    pub material_id: RecordId,
    pub user_id: String,
    pub rewrite_type: RewriteType,
    pub tone: Tone,
    pub target_audience: Option<String>,
    pub keywords: Vec<String>,
    pub rewritten_title: String,
    pub rewritten_content: String,
    pub summary: String,
    pub quality_score: f64,
    pub word_count: usize,
    pub model_name: String,
    pub rewrite_status: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl NewRewriteResult {
    pub fn completed(
        task: &RewriteTask,
        user_id: &str,
        output: &RewriteOutput,
        model_name: &str,
    ) -> Self {
        let Usage {
            prompt_tokens,
            completion_tokens,
            total_tokens,
        } = output.usage;

        Self {
            material_id: task.material_id.clone(),
            user_id: user_id.to_string(),
            rewrite_type: task.rewrite_type(),
            tone: task.tone(),
            target_audience: task.target_audience.clone(),
            keywords: task.keywords.clone(),
            rewritten_title: output.title.clone(),
            rewritten_content: output.content.clone(),
            summary: output.summary.clone(),
            quality_score: output.quality_score,
            word_count: output.word_count,
            model_name: model_name.to_string(),
            rewrite_status: "completed".to_string(),
            prompt_tokens,
            completion_tokens,
            total_tokens,
        }
    }
}

/// A processed task: the rewrite plus the id of its stored result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessOutcome {
    #[serde(flatten)]
    pub output: RewriteOutput,
    pub rewrite_id: RecordId,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    pub material_id: RecordId,
    pub rewrite_id: RecordId,
    pub word_count: usize,
    pub quality_score: f64,
}

/// Per-task entry of a batch run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    pub task_id: RecordId,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub processed: usize,
    pub results: Vec<TaskResult>,
}

/// Which tasks a history lookup returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskSelector {
    Task(RecordId),
    Material(RecordId),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn task_transitions() {
        use TaskStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));
        assert!(Failed.can_transition_to(Pending));

        assert!(!Pending.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Pending));
        assert!(!Failed.can_transition_to(Processing));
    }

    #[test]
    fn material_transitions() {
        use MaterialStatus::*;
        assert!(Collected.can_transition_to(Rewriting));
        assert!(Rewriting.can_transition_to(Collected));
        assert!(Rewritten.can_transition_to(Published));
        assert!(!Collected.can_transition_to(Published));
        assert!(!Published.can_transition_to(Collected));
        assert_eq!(MaterialStatus::parse("Rewritten"), Some(Rewritten));
        assert_eq!(MaterialStatus::parse("全部"), None);
    }

    #[test]
    fn record_ids_keep_their_shape() {
        assert_eq!(RecordId::parse("42"), Some(RecordId::Int(42)));
        assert_eq!(
            RecordId::parse("7f0c-uuid"),
            Some(RecordId::Text("7f0c-uuid".into()))
        );
        assert_eq!(RecordId::parse("  "), None);

        let ids: Vec<RecordId> = serde_json::from_value(json!([1, "a"])).unwrap();
        assert_eq!(ids[0].to_string(), "1");
        assert_eq!(serde_json::to_value(&ids).unwrap(), json!([1, "a"]));
    }

    #[test]
    fn task_row_defaults() {
        let task: RewriteTask = serde_json::from_value(json!({
            "id": 1,
            "material_id": 9,
            "user_id": "u1",
            "rewrite_type": null,
            "tone": "casual",
            "keywords": null,
            "task_status": "pending",
            "error_count": null,
            "materials": {"id": 9, "user_id": "u1", "title": "t", "tags": null}
        }))
        .unwrap();

        assert_eq!(task.max_retries(), DEFAULT_MAX_RETRIES);
        assert_eq!(task.error_count, 0);
        assert_eq!(task.options().rewrite_type, RewriteType::Standard);
        assert_eq!(task.options().tone, Tone::Casual);
        assert!(task.keywords.is_empty());
        assert_eq!(
            task.materials.unwrap().material_status,
            MaterialStatus::Collected
        );
    }

    #[test]
    fn rewrite_source_prefers_content() {
        let mut material: Material = serde_json::from_value(json!({
            "id": 1, "user_id": "u", "title": "t",
            "summary": "摘要", "original_content": ""
        }))
        .unwrap();
        assert_eq!(material.rewrite_source(), "摘要");

        material.original_content = Some("正文".into());
        assert_eq!(material.rewrite_source(), "正文");
    }

    #[test]
    fn patches_only_carry_set_columns() {
        let now = datetime!(2024-01-15 10:00 UTC);
        let value = serde_json::to_value(TaskPatch::failed("boom", 2, now)).unwrap();
        assert_eq!(
            value,
            json!({
                "task_status": "failed",
                "processing_completed_at": "2024-01-15T10:00:00Z",
                "error_message": "boom",
                "error_count": 2
            })
        );

        let value = serde_json::to_value(TaskPatch::requeue(1)).unwrap();
        assert_eq!(value, json!({"task_status": "pending", "current_retry": 1}));
    }

    #[test]
    fn new_task_payload() {
        let value = serde_json::to_value(NewRewriteTask::standard(RecordId::Int(3), "u1")).unwrap();
        assert_eq!(
            value,
            json!({
                "material_id": 3,
                "user_id": "u1",
                "rewrite_type": "standard",
                "tone": "neutral",
                "priority": 5
            })
        );
    }
}
