//! Rewrite tasks and the material library they operate on.
//!
//! A task moves `pending → processing → completed | failed`. Failed tasks are
//! requeued until their retry cap is spent, after which the material returns
//! to `collected`.

pub mod materials;
pub mod models;
pub mod policy;
pub mod processor;
pub mod store;

pub use materials::{
    CollectedItem, MaterialFilters, MaterialLibrary, MaterialListParams, MaterialPage,
    PublishOutcome, StatusCounts,
};
pub use models::{
    BatchReport, Material, MaterialStatus, NewMaterial, ProcessOutcome, RecordId, RewriteTask,
    TaskResult, TaskSelector, TaskStatus,
};
pub use policy::{after_failure, RetryDecision};
pub use processor::{Rewriter, TaskProcessor};
pub use store::{SupabaseTaskStore, TaskStore};

/// The production processor: tasks in Supabase, rewrites through OpenRouter.
pub type SupabaseTaskProcessor = TaskProcessor<SupabaseTaskStore, openrouter::OpenRouterClient>;
