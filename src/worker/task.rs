//! A named closure executed once by a worker.

use std::fmt;
use std::future::Future;

use futures::future::BoxFuture;

use crate::error::TaskError;
use crate::worker::context::TaskContext;

type TaskFn = Box<dyn FnOnce(TaskContext) -> BoxFuture<'static, Result<(), TaskError>> + Send>;

/// A deferred unit of work.
///
/// Built by domain constructors (e.g. "notify about new post") and handed to
/// the worker queue. Failure handling beyond logging is the closure's own
/// business; the queue never retries.
pub struct Task {
    name: String,
    payload: serde_json::Value,
    run: TaskFn,
}

impl Task {
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: FnOnce(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            payload: serde_json::Value::Null,
            run: Box::new(move |ctx| Box::pin(f(ctx))),
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    /// Split into the metadata and the future to execute.
    pub(crate) fn into_parts(self) -> (String, serde_json::Value, TaskFn) {
        (self.name, self.payload, self.run)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("payload", &self.payload)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn runs_closure_with_context() {
        let task = Task::new("Echo", |ctx: TaskContext| async move {
            if ctx.task_name == "Echo" {
                Ok(())
            } else {
                Err(TaskError::Failed {
                    name: ctx.task_name,
                    reason: "unexpected name".into(),
                })
            }
        })
        .with_payload(serde_json::json!({"n": 1}));

        assert_eq!(task.name(), "Echo");
        assert_eq!(task.payload()["n"], 1);

        let (name, payload, run) = task.into_parts();
        let ctx = TaskContext::new(Uuid::new_v4(), name, payload);
        assert!(run(ctx).await.is_ok());
    }
}
