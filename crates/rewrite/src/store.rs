use async_trait::async_trait;
use common::{Query, Result, SupabaseClient};
use serde::Deserialize;
use serde_json::json;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::debug;

use crate::models::{
    Material, MaterialStatus, NewRewriteResult, NewRewriteTask, RecordId, RewriteResultRecord,
    RewriteTask, TaskPatch, TaskSelector, TaskStatus,
};

pub const MATERIALS_TABLE: &str = "materials";
pub const REWRITE_TASKS_TABLE: &str = "rewrite_tasks";
pub const REWRITE_RESULTS_TABLE: &str = "rewrite_results";

/// Persistence used by the rewrite loop.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Pending tasks with their material embedded, highest priority first,
    /// then oldest first.
    async fn pending_tasks(&self, limit: usize) -> Result<Vec<RewriteTask>>;

    async fn task(&self, id: &RecordId) -> Result<Option<RewriteTask>>;

    async fn material(&self, id: &RecordId) -> Result<Option<Material>>;

    async fn update_task(&self, id: &RecordId, patch: &TaskPatch) -> Result<()>;

    /// Applies `patch` only while the task is still pending. `false` means
    /// another worker got there first.
    async fn claim_pending(&self, id: &RecordId, patch: &TaskPatch) -> Result<bool>;

    async fn set_material_status(&self, id: &RecordId, status: MaterialStatus) -> Result<()>;

    async fn insert_result(&self, result: &NewRewriteResult) -> Result<RecordId>;

    async fn insert_task(&self, task: &NewRewriteTask) -> Result<RecordId>;

    /// Deletes completed tasks created before `cutoff`.
    async fn delete_completed_before(&self, cutoff: OffsetDateTime) -> Result<()>;

    /// Tasks matching `selector`, newest first.
    async fn tasks_for(&self, selector: &TaskSelector) -> Result<Vec<RewriteTask>>;

    async fn results_for_materials(&self, ids: &[RecordId]) -> Result<Vec<RewriteResultRecord>>;
}

#[derive(Deserialize)]
struct IdRow {
    id: RecordId,
}

#[derive(Clone)]
pub struct SupabaseTaskStore {
    client: SupabaseClient,
}

impl SupabaseTaskStore {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TaskStore for SupabaseTaskStore {
    async fn pending_tasks(&self, limit: usize) -> Result<Vec<RewriteTask>> {
        let query = Query::from(REWRITE_TASKS_TABLE)
            .select("*, materials(*)")
            .eq("task_status", TaskStatus::Pending.as_str())
            .order("priority", false)
            .order("created_at", true)
            .limit(limit as u64);
        self.client.select(&query).await
    }

    async fn task(&self, id: &RecordId) -> Result<Option<RewriteTask>> {
        let query = Query::from(REWRITE_TASKS_TABLE).eq("id", id);
        self.client.select_single(&query).await
    }

    async fn material(&self, id: &RecordId) -> Result<Option<Material>> {
        let query = Query::from(MATERIALS_TABLE).eq("id", id);
        self.client.select_single(&query).await
    }

    async fn update_task(&self, id: &RecordId, patch: &TaskPatch) -> Result<()> {
        debug!("Updating rewrite task {}: {:?}", id, patch.task_status);
        let query = Query::from(REWRITE_TASKS_TABLE).eq("id", id);
        self.client.update(&query, patch).await
    }

    async fn claim_pending(&self, id: &RecordId, patch: &TaskPatch) -> Result<bool> {
        let query = Query::from(REWRITE_TASKS_TABLE)
            .eq("id", id)
            .eq("task_status", TaskStatus::Pending.as_str());
        let rows: Vec<IdRow> = self.client.update_returning(&query, patch).await?;
        Ok(!rows.is_empty())
    }

    async fn set_material_status(&self, id: &RecordId, status: MaterialStatus) -> Result<()> {
        let query = Query::from(MATERIALS_TABLE).eq("id", id);
        self.client
            .update(&query, &json!({ "material_status": status }))
            .await
    }

    async fn insert_result(&self, result: &NewRewriteResult) -> Result<RecordId> {
        let row: IdRow = self.client.insert(REWRITE_RESULTS_TABLE, result).await?;
        Ok(row.id)
    }

    async fn insert_task(&self, task: &NewRewriteTask) -> Result<RecordId> {
        let row: IdRow = self.client.insert(REWRITE_TASKS_TABLE, task).await?;
        Ok(row.id)
    }

    async fn delete_completed_before(&self, cutoff: OffsetDateTime) -> Result<()> {
        let cutoff = cutoff
            .format(&Rfc3339)
            .map_err(|e| common::Error::Parse(e.to_string()))?;
        let query = Query::from(REWRITE_TASKS_TABLE)
            .eq("task_status", TaskStatus::Completed.as_str())
            .lt("created_at", cutoff);
        self.client.delete(&query).await
    }

    async fn tasks_for(&self, selector: &TaskSelector) -> Result<Vec<RewriteTask>> {
        let query = Query::from(REWRITE_TASKS_TABLE);
        let query = match selector {
            TaskSelector::Task(id) => query.eq("id", id),
            TaskSelector::Material(id) => query.eq("material_id", id),
        };
        self.client.select(&query.order("created_at", false)).await
    }

    async fn results_for_materials(&self, ids: &[RecordId]) -> Result<Vec<RewriteResultRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = Query::from(REWRITE_RESULTS_TABLE)
            .in_list("material_id", ids.iter().map(ToString::to_string))
            .order("created_at", false);
        self.client.select(&query).await
    }
}
