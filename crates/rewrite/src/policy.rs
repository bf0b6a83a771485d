use crate::models::RewriteTask;

/// What happens to a task after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Back to `pending` with the retry counter bumped.
    Requeue { next_retry: u32 },
    /// Leave the task failed and return the material to `collected`.
    GiveUp,
}

/// Decides from the counters as they were before this failure was recorded.
/// No backoff: a requeued task is picked up by the next batch.
pub fn after_failure(task: &RewriteTask) -> RetryDecision {
    if task.error_count < task.max_retries() {
        RetryDecision::Requeue {
            next_retry: task.current_retry + 1,
        }
    } else {
        RetryDecision::GiveUp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task(error_count: u32, max_retries: Option<u32>, current_retry: u32) -> RewriteTask {
        serde_json::from_value(json!({
            "id": 1,
            "material_id": 2,
            "user_id": "u",
            "error_count": error_count,
            "max_retries": max_retries,
            "current_retry": current_retry
        }))
        .unwrap()
    }

    #[test]
    fn requeues_under_the_cap() {
        assert_eq!(
            after_failure(&task(0, Some(3), 0)),
            RetryDecision::Requeue { next_retry: 1 }
        );
        assert_eq!(
            after_failure(&task(2, Some(3), 2)),
            RetryDecision::Requeue { next_retry: 3 }
        );
    }

    #[test]
    fn gives_up_at_the_cap() {
        assert_eq!(after_failure(&task(3, Some(3), 3)), RetryDecision::GiveUp);
        assert_eq!(after_failure(&task(1, Some(0), 0)), RetryDecision::GiveUp);
    }

    #[test]
    fn missing_cap_defaults_to_three() {
        assert_eq!(
            after_failure(&task(2, None, 2)),
            RetryDecision::Requeue { next_retry: 3 }
        );
        assert_eq!(after_failure(&task(3, None, 3)), RetryDecision::GiveUp);
    }
}
