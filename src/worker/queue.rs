//! Worker queue: a bounded in-memory FIFO consumed by a pool of tokio workers.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::WorkerConfig;
use crate::error::WorkerError;
use crate::worker::task::Task;
use crate::worker::worker::run_worker;

/// A task accepted by the queue, waiting for a worker.
pub(crate) struct Queued {
    pub id: Uuid,
    pub enqueued_at: DateTime<Utc>,
    pub task: Task,
}

/// State shared between the queue handle and its workers.
pub(crate) struct Shared {
    pending: Mutex<VecDeque<Queued>>,
    pub notify: Notify,
    capacity: usize,
    closed: AtomicBool,
    pub active: AtomicUsize,
    pub completed: AtomicU64,
    pub failed: AtomicU64,
    pub panicked: AtomicU64,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, VecDeque<Queued>> {
        // Tasks never run while the lock is held, so a poisoned guard still
        // protects a consistent deque.
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Pop the next task and count it as active in one step.
    pub fn pop(&self) -> Option<Queued> {
        let mut pending = self.lock();
        let next = pending.pop_front()?;
        self.active.fetch_add(1, Ordering::SeqCst);
        Some(next)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Point-in-time counters for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub pending: usize,
    pub capacity: usize,
    pub active: usize,
    pub workers: usize,
    pub completed: u64,
    pub failed: u64,
    pub panicked: u64,
}

/// Handle to the worker queue. Cheap to clone; every clone feeds the same
/// workers.
#[derive(Clone)]
pub struct WorkerQueue {
    shared: Arc<Shared>,
    handles: Arc<Mutex<Vec<JoinHandle<()>>>>,
    config: WorkerConfig,
}

impl WorkerQueue {
    /// Create a queue without workers. Tasks accumulate until
    /// [`spawn_workers`](Self::spawn_workers) is called.
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                pending: Mutex::new(VecDeque::new()),
                notify: Notify::new(),
                capacity: config.capacity.max(1),
                closed: AtomicBool::new(false),
                active: AtomicUsize::new(0),
                completed: AtomicU64::new(0),
                failed: AtomicU64::new(0),
                panicked: AtomicU64::new(0),
            }),
            handles: Arc::new(Mutex::new(Vec::new())),
            config,
        }
    }

    /// Create a queue and start its worker pool.
    pub fn start(config: WorkerConfig) -> Self {
        let queue = Self::new(config);
        queue.spawn_workers();
        queue
    }

    /// Spawn `config.workers` worker tasks on the current runtime.
    pub fn spawn_workers(&self) {
        let count = self.config.workers.max(1);
        let mut handles = self.handles.lock().unwrap_or_else(|e| e.into_inner());
        for index in 0..count {
            let shared = Arc::clone(&self.shared);
            handles.push(tokio::spawn(run_worker(index, shared)));
        }
        info!(
            workers = count,
            capacity = self.shared.capacity,
            "Worker pool started"
        );
    }

    /// Append a task and return its id. Never waits.
    pub fn enqueue(&self, task: Task) -> Result<Uuid, WorkerError> {
        let mut pending = self.shared.lock();

        if self.shared.is_closed() {
            return Err(WorkerError::ShuttingDown {
                name: task.name().to_string(),
            });
        }
        if pending.len() >= self.shared.capacity {
            return Err(WorkerError::QueueFull {
                name: task.name().to_string(),
                capacity: self.shared.capacity,
            });
        }

        let id = Uuid::new_v4();
        debug!(task_id = %id, task_name = %task.name(), "Task enqueued");
        pending.push_back(Queued {
            id,
            enqueued_at: Utc::now(),
            task,
        });
        drop(pending);

        self.shared.notify.notify_one();
        Ok(id)
    }

    /// Number of tasks waiting for a worker. May be stale by the time the
    /// caller reads it.
    pub fn len(&self) -> usize {
        self.shared.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of tasks currently executing.
    pub fn active(&self) -> usize {
        self.shared.active.load(Ordering::SeqCst)
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Number of spawned workers that have not exited.
    pub fn workers(&self) -> usize {
        self.handles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|h| !h.is_finished())
            .count()
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            pending: self.len(),
            capacity: self.capacity(),
            active: self.active(),
            workers: self.workers(),
            completed: self.shared.completed.load(Ordering::SeqCst),
            failed: self.shared.failed.load(Ordering::SeqCst),
            panicked: self.shared.panicked.load(Ordering::SeqCst),
        }
    }

    /// Stop accepting tasks, let workers drain what is pending, and wait for
    /// them up to the configured grace period.
    ///
    /// Workers still busy after the grace period are aborted and whatever
    /// they had not finished is reported as abandoned.
    pub async fn shutdown(&self) -> Result<(), WorkerError> {
        {
            let _pending = self.shared.lock();
            self.shared.closed.store(true, Ordering::SeqCst);
        }
        self.shared.notify.notify_waiters();

        let handles: Vec<JoinHandle<()>> = std::mem::take(
            &mut *self.handles.lock().unwrap_or_else(|e| e.into_inner()),
        );

        if handles.is_empty() {
            let abandoned = self.shared.lock().drain(..).count();
            if abandoned > 0 {
                warn!(abandoned, "Worker queue closed without workers");
                return Err(WorkerError::NoWorkers { abandoned });
            }
            return Ok(());
        }

        info!(
            pending = self.len(),
            active = self.active(),
            "Draining worker queue"
        );

        let aborts: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();
        let timeout = self.config.shutdown_timeout;

        let mut joined = std::pin::pin!(join_all(handles));
        let drained = tokio::time::timeout(timeout, joined.as_mut()).await;
        match drained {
            Ok(_) => {
                info!("Worker queue drained");
                Ok(())
            }
            Err(_) => {
                let abandoned = self.shared.lock().drain(..).count() + self.active();
                for abort in aborts {
                    abort.abort();
                }
                // Aborted workers never reach their own decrement.
                joined.await;
                self.shared.active.store(0, Ordering::SeqCst);
                warn!(abandoned, ?timeout, "Worker drain timed out");
                Err(WorkerError::DrainTimeout { timeout, abandoned })
            }
        }
    }
}
