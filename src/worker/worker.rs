//! Worker loop. Pops tasks and runs each inside a panic boundary.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Instant;

use futures::FutureExt;
use tracing::{Instrument, debug, error};

use crate::worker::context::TaskContext;
use crate::worker::queue::{Queued, Shared};

/// Run until the queue is closed and empty.
pub(crate) async fn run_worker(index: usize, shared: Arc<Shared>) {
    debug!(worker = index, "Worker started");

    loop {
        // Register interest before checking the queue so an enqueue or a
        // shutdown landing in between still wakes us.
        let notified = shared.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        match shared.pop() {
            Some(queued) => execute(index, &shared, queued).await,
            None if shared.is_closed() => break,
            None => notified.await,
        }
    }

    debug!(worker = index, "Worker stopped");
}

async fn execute(index: usize, shared: &Shared, queued: Queued) {
    let Queued {
        id,
        enqueued_at,
        task,
    } = queued;
    let (name, payload, run) = task.into_parts();
    let ctx = TaskContext::new(id, name, payload).with_enqueued_at(enqueued_at);
    let span = ctx.span().clone();
    let queued_ms = ctx.queued_ms();
    let started = Instant::now();

    // The closure call itself happens inside the guarded future, so a panic
    // while building the future is caught too.
    let outcome = AssertUnwindSafe(async move { run(ctx).await })
        .catch_unwind()
        .instrument(span.clone())
        .await;

    let elapsed_ms = started.elapsed().as_millis() as u64;
    span.in_scope(|| match outcome {
        Ok(Ok(())) => {
            shared.completed.fetch_add(1, Ordering::SeqCst);
            debug!(worker = index, queued_ms, elapsed_ms, "Task completed");
        }
        Ok(Err(e)) => {
            shared.failed.fetch_add(1, Ordering::SeqCst);
            error!(worker = index, elapsed_ms, error = %e, "Task failed");
        }
        Err(panic) => {
            shared.panicked.fetch_add(1, Ordering::SeqCst);
            error!(
                worker = index,
                elapsed_ms,
                panic = %panic_message(panic.as_ref()),
                "Task panicked"
            );
        }
    });
    shared.active.fetch_sub(1, Ordering::SeqCst);
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
