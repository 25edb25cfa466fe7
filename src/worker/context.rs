//! Per-execution task context.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Context handed to a task when a worker executes it.
///
/// Carries the identifying metadata and a span so everything the task logs
/// is tagged with `task_id` and `task_name`.
#[derive(Debug, Clone)]
pub struct TaskContext {
    /// Identifier assigned at enqueue time.
    pub task_id: Uuid,
    /// Name given by the task constructor.
    pub task_name: String,
    /// Metadata describing what the task operates on.
    pub payload: serde_json::Value,
    /// When the task was accepted by the queue.
    pub enqueued_at: DateTime<Utc>,
    span: tracing::Span,
}

impl TaskContext {
    /// Create a new task context.
    pub fn new(task_id: Uuid, task_name: impl Into<String>, payload: serde_json::Value) -> Self {
        let task_name = task_name.into();
        let span = tracing::info_span!("task", task_id = %task_id, task_name = %task_name);
        Self {
            task_id,
            task_name,
            payload,
            enqueued_at: Utc::now(),
            span,
        }
    }

    pub fn with_enqueued_at(mut self, enqueued_at: DateTime<Utc>) -> Self {
        self.enqueued_at = enqueued_at;
        self
    }

    /// The span tasks should log under.
    pub fn span(&self) -> &tracing::Span {
        &self.span
    }

    /// Time spent waiting in the queue, in milliseconds.
    pub fn queued_ms(&self) -> i64 {
        (Utc::now() - self.enqueued_at).num_milliseconds().max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carries_identifying_metadata() {
        let id = Uuid::new_v4();
        let ctx = TaskContext::new(id, "TaskName", serde_json::json!({"post": 1}));
        assert_eq!(ctx.task_id, id);
        assert_eq!(ctx.task_name, "TaskName");
        assert_eq!(ctx.payload["post"], 1);
        assert!(ctx.queued_ms() >= 0);
    }
}
