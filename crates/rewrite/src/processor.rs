use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use common::config::RewriteConfig;
use common::{Error, Result};
use openrouter::{OpenRouterClient, RewriteOptions, RewriteOutput};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::models::{
    BatchReport, Material, MaterialStatus, NewRewriteResult, NewRewriteTask, ProcessOutcome,
    RecordId, RewriteTask, TaskPatch, TaskResult, TaskSelector, TaskSummary,
};
use crate::policy::{after_failure, RetryDecision};
use crate::store::TaskStore;

/// The LLM behind a rewrite.
#[async_trait]
pub trait Rewriter: Send + Sync {
    async fn rewrite(
        &self,
        title: &str,
        content: &str,
        options: &RewriteOptions,
    ) -> Result<RewriteOutput>;

    /// Model name recorded with each result.
    fn model_name(&self) -> &str;
}

#[async_trait]
impl Rewriter for OpenRouterClient {
    async fn rewrite(
        &self,
        title: &str,
        content: &str,
        options: &RewriteOptions,
    ) -> Result<RewriteOutput> {
        self.rewrite_content(title, content, options).await
    }

    fn model_name(&self) -> &str {
        self.model()
    }
}

/// Drives rewrite tasks through their lifecycle.
pub struct TaskProcessor<S, R> {
    store: S,
    rewriter: R,
    batch_size: usize,
    task_delay: Duration,
    purge_after_days: i64,
    batch_lock: Mutex<()>,
}

impl<S: TaskStore, R: Rewriter> TaskProcessor<S, R> {
    pub fn new(store: S, rewriter: R, config: &RewriteConfig) -> Self {
        Self {
            store,
            rewriter,
            batch_size: config.batch_size,
            task_delay: config.task_delay,
            purge_after_days: config.purge_after_days,
            batch_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Runs one attempt of `task`. On failure the task is marked failed and
    /// then either requeued or given up on, and the error is returned.
    pub async fn process(
        &self,
        task: &RewriteTask,
        material: Option<&Material>,
        user_id: Option<&str>,
    ) -> Result<ProcessOutcome> {
        info!("Processing rewrite task {}", task.id);

        let attempt = match self
            .store
            .update_task(&task.id, &TaskPatch::processing(OffsetDateTime::now_utc()))
            .await
        {
            Ok(()) => self.attempt(task, material, user_id).await,
            Err(e) => Err(e),
        };
        self.settle(task, attempt).await
    }

    async fn settle(
        &self,
        task: &RewriteTask,
        attempt: Result<ProcessOutcome>,
    ) -> Result<ProcessOutcome> {
        match attempt {
            Ok(outcome) => {
                info!(
                    "Rewrite task {} completed with result {}",
                    task.id, outcome.rewrite_id
                );
                Ok(outcome)
            }
            Err(e) => {
                error!("Rewrite task {} failed: {}", task.id, e);
                self.record_failure(task, &e.to_string()).await;
                Err(e)
            }
        }
    }

    /// Everything after the task is marked processing.
    async fn attempt(
        &self,
        task: &RewriteTask,
        material: Option<&Material>,
        user_id: Option<&str>,
    ) -> Result<ProcessOutcome> {
        self.store
            .set_material_status(&task.material_id, MaterialStatus::Rewriting)
            .await?;

        let material = material.ok_or_else(|| Error::not_found("material", &task.material_id))?;

        let output = self
            .rewriter
            .rewrite(&material.title, material.rewrite_source(), &task.options())
            .await?;

        let user_id = user_id.unwrap_or(&task.user_id);
        let record =
            NewRewriteResult::completed(task, user_id, &output, self.rewriter.model_name());
        let rewrite_id = self.store.insert_result(&record).await?;

        self.store
            .update_task(&task.id, &TaskPatch::completed(OffsetDateTime::now_utc()))
            .await?;
        self.store
            .set_material_status(&task.material_id, MaterialStatus::Rewritten)
            .await?;

        Ok(ProcessOutcome { output, rewrite_id })
    }

    /// Failure bookkeeping. Write errors here are logged; the original error
    /// is what the caller sees.
    async fn record_failure(&self, task: &RewriteTask, message: &str) {
        let patch = TaskPatch::failed(message, task.error_count + 1, OffsetDateTime::now_utc());
        if let Err(e) = self.store.update_task(&task.id, &patch).await {
            warn!("Could not mark task {} failed: {}", task.id, e);
        }

        match after_failure(task) {
            RetryDecision::Requeue { next_retry } => {
                info!("Requeueing task {} (retry {})", task.id, next_retry);
                if let Err(e) = self
                    .store
                    .update_task(&task.id, &TaskPatch::requeue(next_retry))
                    .await
                {
                    warn!("Could not requeue task {}: {}", task.id, e);
                }
            }
            RetryDecision::GiveUp => {
                warn!(
                    "Task {} exhausted its {} retries",
                    task.id,
                    task.max_retries()
                );
                if let Err(e) = self
                    .store
                    .set_material_status(&task.material_id, MaterialStatus::Collected)
                    .await
                {
                    warn!("Could not reset material {}: {}", task.material_id, e);
                }
            }
        }
    }

    /// Loads a task and its material and processes it.
    pub async fn process_by_id(
        &self,
        task_id: &RecordId,
        user_id: Option<&str>,
    ) -> Result<ProcessOutcome> {
        let task = self
            .store
            .task(task_id)
            .await?
            .ok_or_else(|| Error::not_found("rewrite_task", task_id))?;
        let material = self
            .store
            .material(&task.material_id)
            .await?
            .ok_or_else(|| Error::not_found("material", &task.material_id))?;

        self.process(&task, Some(&material), user_id).await
    }

    /// Processes up to `batch_size` pending tasks one after another, pausing
    /// between them. A run that starts while another is in progress returns
    /// an empty report, and tasks claimed elsewhere since the listing are
    /// skipped.
    pub async fn run_batch(&self) -> Result<BatchReport> {
        let Ok(_running) = self.batch_lock.try_lock() else {
            info!("Rewrite batch already running, skipping this run");
            return Ok(BatchReport::default());
        };

        let tasks = self.store.pending_tasks(self.batch_size).await?;
        if tasks.is_empty() {
            info!("No pending rewrite tasks");
            return Ok(BatchReport::default());
        }

        info!("Processing {} pending rewrite tasks", tasks.len());
        let mut results = Vec::with_capacity(tasks.len());

        for task in &tasks {
            let claim = self
                .store
                .claim_pending(&task.id, &TaskPatch::processing(OffsetDateTime::now_utc()))
                .await;
            let attempt = match claim {
                Ok(false) => {
                    info!("Rewrite task {} was claimed elsewhere, skipping", task.id);
                    continue;
                }
                Ok(true) => {
                    info!("Processing rewrite task {}", task.id);
                    self.attempt(task, task.materials.as_ref(), None).await
                }
                Err(e) => Err(e),
            };

            let result = match self.settle(task, attempt).await {
                Ok(outcome) => TaskResult {
                    task_id: task.id.clone(),
                    success: true,
                    result: Some(TaskSummary {
                        material_id: task.material_id.clone(),
                        rewrite_id: outcome.rewrite_id,
                        word_count: outcome.output.word_count,
                        quality_score: outcome.output.quality_score,
                    }),
                    error: None,
                },
                Err(e) => TaskResult {
                    task_id: task.id.clone(),
                    success: false,
                    result: None,
                    error: Some(e.to_string()),
                },
            };
            results.push(result);

            sleep(self.task_delay).await;
        }

        let succeeded = results.iter().filter(|r| r.success).count();
        info!(
            "Rewrite batch finished: {} succeeded, {} failed",
            succeeded,
            results.len() - succeeded
        );

        Ok(BatchReport {
            processed: results.len(),
            results,
        })
    }

    /// Deletes completed tasks older than the configured age. Returns the
    /// cutoff used.
    pub async fn purge_completed(&self) -> Result<OffsetDateTime> {
        let cutoff = OffsetDateTime::now_utc() - time::Duration::days(self.purge_after_days);
        self.store.delete_completed_before(cutoff).await?;
        info!("Purged completed rewrite tasks created before {}", cutoff);
        Ok(cutoff)
    }

    /// Queues a standard rewrite of a material.
    pub async fn enqueue(&self, material_id: RecordId, user_id: &str) -> Result<RecordId> {
        let id = self
            .store
            .insert_task(&NewRewriteTask::standard(material_id.clone(), user_id))
            .await?;
        info!("Queued rewrite task {} for material {}", id, material_id);
        Ok(id)
    }

    /// Tasks newest first, each carrying the rewrite results of its material.
    pub async fn task_history(&self, selector: &TaskSelector) -> Result<Vec<RewriteTask>> {
        let mut tasks = self.store.tasks_for(selector).await?;

        let mut material_ids: Vec<RecordId> = Vec::new();
        for task in &tasks {
            if !material_ids.contains(&task.material_id) {
                material_ids.push(task.material_id.clone());
            }
        }

        let mut by_material: HashMap<RecordId, Vec<_>> = HashMap::new();
        for result in self.store.results_for_materials(&material_ids).await? {
            if let Some(material_id) = result.material_id.clone() {
                by_material.entry(material_id).or_default().push(result);
            }
        }

        for task in &mut tasks {
            task.rewrite_results = Some(
                by_material
                    .get(&task.material_id)
                    .cloned()
                    .unwrap_or_default(),
            );
        }

        Ok(tasks)
    }
}
